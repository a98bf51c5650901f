mod common;

use chrono::{Duration, SecondsFormat};
use common::{advance_secs, settle, Harness};
use flow_timer::{
    controller::Outcome,
    state::{Lifecycle, Preferences, Timer, TimerDescriptor, TimerId},
    tasks::{ReconcileReport, ServerReconciler},
    utils::Clock,
};
use pretty_assertions::assert_eq;

fn reconciler(h: &Harness) -> ServerReconciler {
    ServerReconciler::new(h.controller.clone(), h.backend.clone())
}

fn descriptor(id: u64, duration_seconds: u64) -> TimerDescriptor {
    TimerDescriptor {
        id: TimerId::from(id),
        name: format!("Timer {}", id),
        duration_seconds,
        lifecycle: Lifecycle::Stopped,
        started_at: None,
        paused_at: None,
    }
}

/// Put a timer in the backend in the given state
fn seed(h: &Harness, timer: Timer) {
    h.backend.inner.insert(timer);
}

#[tokio::test(start_paused = true)]
async fn fallback_matches_the_backend_estimate() {
    // Network path
    let online = Harness::new();
    seed(
        &online,
        Timer {
            lifecycle: Lifecycle::Running,
            started_at: Some(online.clock.now() - Duration::seconds(300)),
            ..Timer::stopped(TimerId::from(1), "Timer 1", 1200)
        },
    );
    let report = reconciler(&online)
        .reconcile_on_load(&[descriptor(1, 1200)])
        .await
        .unwrap();
    assert_eq!(report.resumed, 1);
    assert_eq!(online.controller.remaining_ms(&TimerId::from(1)), 900_000);

    // Fallback path from the descriptor's own anchors
    let offline = Harness::new();
    offline.backend.fail_state_fetches();
    let anchor = offline.clock.now() - Duration::seconds(300);
    let running = TimerDescriptor {
        lifecycle: Lifecycle::Running,
        started_at: Some(anchor.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        ..descriptor(1, 1200)
    };
    let report = reconciler(&offline)
        .reconcile_on_load(&[running])
        .await
        .unwrap();
    assert_eq!(
        report,
        ReconcileReport {
            resumed: 1,
            fallbacks: 1,
            ..ReconcileReport::default()
        }
    );
    assert_eq!(offline.controller.remaining_ms(&TimerId::from(1)), 900_000);
    assert!(offline.store.has_countdown(&TimerId::from(1)));
}

#[tokio::test(start_paused = true)]
async fn restores_running_paused_and_stopped_timers() {
    let h = Harness::new();
    let now = h.clock.now();
    seed(
        &h,
        Timer {
            lifecycle: Lifecycle::Running,
            started_at: Some(now - Duration::seconds(60)),
            ..Timer::stopped(TimerId::from(1), "Timer 1", 600)
        },
    );
    seed(
        &h,
        Timer {
            lifecycle: Lifecycle::Paused,
            started_at: Some(now - Duration::seconds(200)),
            paused_at: Some(now - Duration::seconds(50)),
            ..Timer::stopped(TimerId::from(2), "Timer 2", 600)
        },
    );
    seed(&h, Timer::stopped(TimerId::from(3), "Timer 3", 600));

    let report = reconciler(&h)
        .reconcile_on_load(&[descriptor(1, 600), descriptor(2, 600), descriptor(3, 600)])
        .await
        .unwrap();
    assert_eq!(
        report,
        ReconcileReport {
            resumed: 1,
            paused: 1,
            stopped: 1,
            fallbacks: 0,
        }
    );

    let running = h.controller.view(&TimerId::from(1)).unwrap();
    assert_eq!(running.lifecycle, Lifecycle::Running);
    assert_eq!(running.remaining_ms, 540_000);
    assert!(running.countdown_active);

    let paused = h.controller.view(&TimerId::from(2)).unwrap();
    assert_eq!(paused.lifecycle, Lifecycle::Paused);
    assert_eq!(paused.remaining_ms, 450_000);
    assert_eq!(paused.display, "07:30");
    assert!(!paused.countdown_active);

    let stopped = h.controller.view(&TimerId::from(3)).unwrap();
    assert_eq!(stopped.lifecycle, Lifecycle::Stopped);
    assert_eq!(stopped.display, "00:00:00");
    assert_eq!(h.store.active_countdowns(), 1);

    // The restored paused timer resumes from what the backend reported
    advance_secs(30).await;
    assert_eq!(h.controller.remaining_ms(&TimerId::from(2)), 450_000);
    assert_eq!(h.controller.resume(&TimerId::from(2)), Outcome::Applied);
    assert_eq!(h.controller.remaining_ms(&TimerId::from(2)), 450_000);
    assert_eq!(h.controller.remaining_ms(&TimerId::from(1)), 510_000);

    // Restoring touches nothing on the backend
    assert_eq!(h.journal.count("update:1:resume"), 0);
    assert_eq!(h.journal.count("update:1:start"), 0);
}

#[tokio::test(start_paused = true)]
async fn runs_only_once() {
    let h = Harness::new();
    h.add_timer(1, 600);
    let reconciler = reconciler(&h);

    assert!(reconciler.reconcile_on_load(&[descriptor(1, 600)]).await.is_some());
    assert!(reconciler.reconcile_on_load(&[descriptor(1, 600)]).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn unusable_anchors_show_the_timer_stopped() {
    let h = Harness::new();
    h.backend.fail_state_fetches();

    let garbled = TimerDescriptor {
        lifecycle: Lifecycle::Running,
        started_at: Some("not a time".to_string()),
        ..descriptor(1, 600)
    };
    let missing = TimerDescriptor {
        lifecycle: Lifecycle::Running,
        ..descriptor(2, 600)
    };

    let report = reconciler(&h)
        .reconcile_on_load(&[garbled, missing])
        .await
        .unwrap();
    assert_eq!(report.stopped, 2);
    assert_eq!(report.fallbacks, 2);
    assert_eq!(h.store.active_countdowns(), 0);

    // Never treated as complete
    advance_secs(5).await;
    assert!(h.sink.notices().is_empty());
    assert!(!h.controller.view(&TimerId::from(1)).unwrap().completed);
}

#[tokio::test(start_paused = true)]
async fn preferences_fall_back_to_defaults() {
    let quiet = Preferences {
        enable_mid_checkin: false,
        ..Preferences::default()
    };
    let h = Harness::with(Default::default(), quiet, common::RecordingSink::new);
    h.backend.fail_preferences();
    h.add_timer(1, 600);

    reconciler(&h).reconcile_on_load(&[descriptor(1, 600)]).await;
    assert_eq!(h.controller.preferences(), Preferences::default());
}

#[tokio::test(start_paused = true)]
async fn preferences_are_loaded_before_restoring() {
    let quiet = Preferences {
        enable_mid_checkin: false,
        ..Preferences::default()
    };
    let h = Harness::with(Default::default(), quiet, common::RecordingSink::new);
    let now = h.clock.now();
    seed(
        &h,
        Timer {
            lifecycle: Lifecycle::Running,
            started_at: Some(now - Duration::seconds(600)),
            ..Timer::stopped(TimerId::from(1), "Timer 1", 1800)
        },
    );

    reconciler(&h).reconcile_on_load(&[descriptor(1, 1800)]).await;
    assert_eq!(h.controller.preferences(), quiet);

    advance_secs(400).await;
    assert_eq!(h.journal.count("checkin:1:mid"), 0);
}

#[tokio::test(start_paused = true)]
async fn backend_remainder_wins_over_a_stale_duration() {
    let h = Harness::new();
    let now = h.clock.now();
    seed(
        &h,
        Timer {
            lifecycle: Lifecycle::Running,
            started_at: Some(now - Duration::seconds(300)),
            ..Timer::stopped(TimerId::from(1), "Timer 1", 3600)
        },
    );
    seed(
        &h,
        Timer {
            lifecycle: Lifecycle::Paused,
            started_at: Some(now - Duration::seconds(400)),
            paused_at: Some(now - Duration::seconds(100)),
            ..Timer::stopped(TimerId::from(2), "Timer 2", 3600)
        },
    );

    // Both descriptors still carry an older, shorter session length
    reconciler(&h)
        .reconcile_on_load(&[descriptor(1, 1500), descriptor(2, 1500)])
        .await
        .unwrap();

    let running = TimerId::from(1);
    assert_eq!(h.controller.remaining_ms(&running), 3_300_000);
    let ends_at = h.store.timer(&running).unwrap().ends_at().unwrap();
    assert_eq!(ends_at, now + Duration::milliseconds(3_300_000));

    let paused = TimerId::from(2);
    assert_eq!(h.controller.remaining_ms(&paused), 3_300_000);
    assert_eq!(h.controller.resume(&paused), Outcome::Applied);
    assert_eq!(h.controller.remaining_ms(&paused), 3_300_000);

    advance_secs(60).await;
    assert_eq!(h.controller.remaining_ms(&running), 3_240_000);
}

#[tokio::test(start_paused = true)]
async fn timer_shown_stopped_by_fallback_can_still_be_stopped() {
    let h = Harness::new();
    let id = TimerId::from(1);
    seed(
        &h,
        Timer {
            lifecycle: Lifecycle::Running,
            started_at: Some(h.clock.now() - Duration::seconds(60)),
            ..Timer::stopped(id.clone(), "Timer 1", 600)
        },
    );
    h.backend.fail_state_fetches();

    let garbled = TimerDescriptor {
        lifecycle: Lifecycle::Running,
        started_at: Some("garbage".to_string()),
        ..descriptor(1, 600)
    };
    reconciler(&h).reconcile_on_load(&[garbled]).await.unwrap();
    assert_eq!(h.controller.view(&id).unwrap().lifecycle, Lifecycle::Stopped);

    assert_eq!(h.controller.stop(&id), Outcome::Applied);
    settle().await;
    assert_eq!(h.journal.count("update:1:stop"), 1);
    assert_eq!(h.backend.inner.timer(&id).unwrap().lifecycle, Lifecycle::Stopped);
}
