//! Timer session state machine
//!
//! `Stopped -> Running -> {Paused, Stopped}`, `Paused -> {Running, Stopped}`.
//! Every transition updates local state first and syncs with the backend in
//! the background: a failed sync is surfaced as a warning and never rolls
//! back what the user sees.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    config::ControllerSettings,
    error::TimerError,
    services::{Notice, NoticeLevel, NotificationSink, TimerBackend},
    state::{
        resolve, CheckinStage, EnergyLevel, Lifecycle, Preferences, Timer, TimerAction, TimerId,
        TimerSessionStore, TimerView,
    },
    utils::format_compact,
};

/// Result of a transition request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Applied,
    /// Not legal from the current state; nothing changed
    Ignored,
}

#[derive(Debug)]
struct CheckinBudget {
    day: Option<NaiveDate>,
    used: u32,
}

pub struct TimerController {
    me: Weak<TimerController>,
    store: Arc<TimerSessionStore>,
    backend: Arc<dyn TimerBackend>,
    sink: Arc<dyn NotificationSink>,
    settings: ControllerSettings,
    preferences: Mutex<Preferences>,
    checkins: Mutex<CheckinBudget>,
}

impl TimerController {
    pub fn new(
        store: Arc<TimerSessionStore>,
        backend: Arc<dyn TimerBackend>,
        sink: Arc<dyn NotificationSink>,
        settings: ControllerSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            store,
            backend,
            sink,
            settings,
            preferences: Mutex::new(Preferences::default()),
            checkins: Mutex::new(CheckinBudget { day: None, used: 0 }),
        })
    }

    pub fn store(&self) -> &Arc<TimerSessionStore> {
        &self.store
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    fn now(&self) -> DateTime<Utc> {
        self.store.clock().now()
    }

    /// Make a timer known locally (name, duration) without touching its run
    pub fn register(&self, timer: Timer) {
        self.store.register(timer);
    }

    pub fn view(&self, id: &TimerId) -> Option<TimerView> {
        self.store.view(id)
    }

    pub fn views(&self) -> Vec<TimerView> {
        self.store.views()
    }

    pub fn remaining_ms(&self, id: &TimerId) -> u64 {
        self.store.remaining_ms(id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Preferences
    // ─────────────────────────────────────────────────────────────────────

    fn preferences_lock(&self) -> MutexGuard<'_, Preferences> {
        self.preferences.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached preferences; defaults until the first successful refresh
    pub fn preferences(&self) -> Preferences {
        *self.preferences_lock()
    }

    /// Reload preferences from the backend, keeping the cached copy on failure
    pub async fn refresh_preferences(&self) -> Preferences {
        match self.backend.get_user_preferences().await {
            Ok(preferences) => {
                debug!("Loaded preferences: {:?}", preferences);
                *self.preferences_lock() = preferences;
                preferences
            }
            Err(e) => {
                warn!("Using cached preferences: {}", e);
                self.preferences()
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // User-driven transitions
    // ─────────────────────────────────────────────────────────────────────

    /// Begin a fresh run of `duration_seconds`. Ignored unless stopped or
    /// when the duration is outside the accepted session range.
    pub fn start(&self, id: &TimerId, duration_seconds: u64) -> Outcome {
        if let Err(e) = Timer::validate_duration(duration_seconds) {
            warn!("Refusing to start timer {}: {}", id, e);
            return Outcome::Ignored;
        }

        let now = self.now();
        let timer = match self.store.transition(id, &[Lifecycle::Stopped], Lifecycle::Running, |timer| {
            timer.duration_seconds = duration_seconds;
            timer.started_at = Some(now);
            timer.paused_at = None;
        }) {
            Ok(timer) => timer,
            Err(state) => return self.ignore(id, TimerAction::Start, state),
        };

        info!("Starting timer {} for {}", id, format_compact(timer.duration_ms()));

        let start_checkin = self.preferences().enable_start_checkin;
        if start_checkin && self.settings.checkin_before_start {
            self.spawn_checkin(id, CheckinStage::Start);
        }
        self.persist(id, TimerAction::Start);
        self.install_countdown(&timer);
        if start_checkin && !self.settings.checkin_before_start {
            self.spawn_checkin(id, CheckinStage::Start);
        }

        Outcome::Applied
    }

    /// Freeze a running timer, keeping its remaining time for [`Self::resume`]
    pub fn pause(&self, id: &TimerId) -> Outcome {
        let now = self.now();
        let timer = match self.store.transition(id, &[Lifecycle::Running], Lifecycle::Paused, |timer| {
            timer.paused_at = Some(now);
        }) {
            Ok(timer) => timer,
            Err(state) => return self.ignore(id, TimerAction::Pause, state),
        };

        self.store.cancel_countdown(id);
        self.store.cancel_mid_checkin(id);

        let remaining = resolve(&timer, now);
        self.store.snapshot_paused_remaining(id, remaining);
        self.store.record_tick(id, remaining);
        info!("Paused timer {} with {} left", id, format_compact(remaining));

        self.persist(id, TimerAction::Pause);
        self.notify(
            NoticeLevel::Info,
            id,
            format!("{} paused with {} left", display_name(&timer), format_compact(remaining)),
        );

        Outcome::Applied
    }

    /// Continue a paused timer from its snapshot; wall-clock time spent
    /// paused does not count.
    pub fn resume(&self, id: &TimerId) -> Outcome {
        let state = self.store.lifecycle(id);
        if state != Lifecycle::Paused {
            return self.ignore(id, TimerAction::Resume, state);
        }
        let Some(snapshot) = self.store.consume_paused_remaining(id) else {
            return self.ignore(id, TimerAction::Resume, state);
        };

        let now = self.now();
        let timer = match self.store.transition(id, &[Lifecycle::Paused], Lifecycle::Running, |timer| {
            anchor_remaining(timer, now, snapshot);
            timer.paused_at = None;
        }) {
            Ok(timer) => timer,
            Err(state) => {
                self.store.snapshot_paused_remaining(id, snapshot);
                return self.ignore(id, TimerAction::Resume, state);
            }
        };

        info!("Resuming timer {} with {} left", id, format_compact(snapshot));
        self.install_countdown(&timer);
        self.persist(id, TimerAction::Resume);

        Outcome::Applied
    }

    /// End the current run. Legal from any state: the backend is always
    /// told, since a timer shown stopped here may still run there. Prompts
    /// only follow when a run was actually ended.
    pub fn stop(&self, id: &TimerId) -> Outcome {
        let previous = self.store.end_run(id, false);
        self.persist(id, TimerAction::Stop);

        if previous == Lifecycle::Stopped {
            debug!("Timer {} already stopped locally, syncing stop only", id);
            return Outcome::Applied;
        }

        info!("Stopped timer {} (was {})", id, previous);
        if let Some(timer) = self.store.timer(id) {
            self.notify(NoticeLevel::Info, id, format!("{} stopped", display_name(&timer)));
        }
        self.spawn_session_end(id);

        Outcome::Applied
    }

    // ─────────────────────────────────────────────────────────────────────
    // Countdown hooks
    // ─────────────────────────────────────────────────────────────────────

    /// Natural expiry of a run. Runs once per run from the countdown task.
    pub fn on_complete(&self, id: &TimerId) {
        let state = self.store.lifecycle(id);
        if state != Lifecycle::Running {
            debug!("Ignoring completion of timer {} while {}", id, state);
            return;
        }

        self.store.end_run(id, true);
        info!("Timer {} complete", id);
        if let Some(timer) = self.store.timer(id) {
            self.notify(NoticeLevel::Info, id, format!("{} complete", display_name(&timer)));
        }

        self.persist_completion(id);
        self.spawn_session_end(id);
    }

    /// Halfway through a long enough run, ask for a mid-session check-in
    pub fn on_midpoint(&self, id: &TimerId) {
        let Some(timer) = self.store.timer(id) else {
            return;
        };
        if timer.lifecycle != Lifecycle::Running {
            return;
        }
        if timer.duration_seconds < self.settings.midpoint_floor_seconds {
            return;
        }

        let elapsed = timer.duration_ms().saturating_sub(resolve(&timer, self.now()));
        if elapsed.saturating_mul(2) < timer.duration_ms() {
            return;
        }
        if !self.preferences().enable_mid_checkin {
            return;
        }
        if !self.store.mark_mid_checkin_fired(id) {
            return;
        }

        info!("Timer {} reached its midpoint", id);
        if let Some(handle) = self.spawn_checkin(id, CheckinStage::Mid) {
            self.store.track_mid_checkin(id, handle.abort_handle());
        }
    }

    fn on_tick(&self, id: &TimerId, duration_ms: u64, remaining_ms: u64) {
        self.store.record_tick(id, remaining_ms);
        let elapsed = duration_ms.saturating_sub(remaining_ms);
        if remaining_ms > 0 && elapsed.saturating_mul(2) >= duration_ms {
            self.on_midpoint(id);
        }
    }

    fn install_countdown(&self, timer: &Timer) {
        let Some(ends_at) = timer.ends_at() else {
            error!("Timer {} is running without a start anchor", timer.id);
            return;
        };

        let duration_ms = timer.duration_ms();
        let tick = (self.me.clone(), timer.id.clone());
        let done = (self.me.clone(), timer.id.clone());

        self.store.start_countdown(
            &timer.id,
            ends_at,
            move |remaining| {
                if let Some(controller) = tick.0.upgrade() {
                    controller.on_tick(&tick.1, duration_ms, remaining);
                }
            },
            move || {
                if let Some(controller) = done.0.upgrade() {
                    controller.on_complete(&done.1);
                }
            },
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Load-time paths
    // ─────────────────────────────────────────────────────────────────────

    /// Cold-start a countdown for a timer the backend reports as running.
    ///
    /// Unlike [`Self::resume`] this needs no paused snapshot and does not
    /// notify the backend, which already has the timer running. The
    /// backend's remainder wins over a shorter local duration.
    pub fn resume_from_remaining(&self, id: &TimerId, remaining_ms: u64) -> Outcome {
        let now = self.now();
        let timer = match self.store.transition(
            id,
            &[Lifecycle::Stopped, Lifecycle::Paused],
            Lifecycle::Running,
            |timer| {
                anchor_remaining(timer, now, remaining_ms);
                timer.paused_at = None;
            },
        ) {
            Ok(timer) => timer,
            Err(state) => return self.ignore(id, TimerAction::Resume, state),
        };

        self.store.consume_paused_remaining(id);
        let elapsed = timer.duration_ms().saturating_sub(remaining_ms);
        // Don't prompt for a midpoint that passed while the page was closed
        self.store
            .set_mid_checkin_fired(id, elapsed.saturating_mul(2) >= timer.duration_ms());

        info!("Restored running timer {} with {} left", id, format_compact(remaining_ms));
        self.install_countdown(&timer);
        Outcome::Applied
    }

    /// Show a paused timer without a countdown, ready to resume
    pub fn show_paused(&self, id: &TimerId, remaining_ms: u64) {
        self.store.cancel_countdown(id);
        self.store.cancel_mid_checkin(id);

        let now = self.now();
        let moved = self.store.transition(
            id,
            &[Lifecycle::Stopped, Lifecycle::Running, Lifecycle::Paused],
            Lifecycle::Paused,
            |timer| {
                anchor_remaining(timer, now, remaining_ms);
                timer.paused_at = Some(now);
            },
        );
        if moved.is_ok() {
            self.store.consume_paused_remaining(id);
            self.store.snapshot_paused_remaining(id, remaining_ms);
            self.store.record_tick(id, remaining_ms);
            debug!("Restored paused timer {} with {} left", id, format_compact(remaining_ms));
        }
    }

    /// Show a stopped timer without a countdown
    pub fn show_stopped(&self, id: &TimerId) {
        self.store.end_run(id, false);
        debug!("Restored stopped timer {}", id);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Side effects
    // ─────────────────────────────────────────────────────────────────────

    fn notify(&self, level: NoticeLevel, id: &TimerId, message: impl Into<String>) {
        self.sink
            .notify(Notice::new(level, Some(id), message, self.now()));
    }

    fn ignore(&self, id: &TimerId, action: TimerAction, state: Lifecycle) -> Outcome {
        let err = TimerError::IllegalTransition {
            id: id.clone(),
            action,
            state,
        };
        debug!("Ignored: {}", err);
        Outcome::Ignored
    }

    /// Fire-and-forget backend sync
    fn persist(&self, id: &TimerId, action: TimerAction) {
        let Some(controller) = self.me.upgrade() else {
            return;
        };
        let id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.backend.update_timer(&id, action).await {
                warn!("Failed to sync {} for timer {}: {}", action, id, e);
                controller.notify(
                    NoticeLevel::Warning,
                    &id,
                    format!("Couldn't save {} to the server; the timer keeps running here", action),
                );
            }
        });
    }

    /// Completion sync gets one silent retry before it is surfaced
    fn persist_completion(&self, id: &TimerId) {
        let Some(controller) = self.me.upgrade() else {
            return;
        };
        let id = id.clone();
        tokio::spawn(async move {
            let Err(first) = controller.backend.update_timer(&id, TimerAction::Stop).await else {
                return;
            };
            debug!("Retrying completion sync for timer {}: {}", id, first);

            if let Err(e) = controller.backend.update_timer(&id, TimerAction::Stop).await {
                error!("Failed to record completion of timer {}: {}", id, e);
                controller.notify(
                    NoticeLevel::Error,
                    &id,
                    "Session complete, but the server could not be updated",
                );
            }
        });
    }

    fn take_checkin_budget(&self) -> bool {
        let Some(max) = self.settings.max_daily_checkins else {
            return true;
        };

        let today = self.now().date_naive();
        let mut budget = self.checkins.lock().unwrap_or_else(PoisonError::into_inner);
        if budget.day != Some(today) {
            budget.day = Some(today);
            budget.used = 0;
        }
        if budget.used >= max {
            return false;
        }
        budget.used += 1;
        true
    }

    /// Raise an energy prompt and save the answer. Returns the task so the
    /// caller can cancel a prompt tied to the current run.
    fn spawn_checkin(&self, id: &TimerId, stage: CheckinStage) -> Option<tokio::task::JoinHandle<()>> {
        let controller = self.me.upgrade()?;
        let id = id.clone();
        Some(tokio::spawn(async move {
            controller.run_checkin(&id, stage).await;
        }))
    }

    async fn run_checkin(&self, id: &TimerId, stage: CheckinStage) {
        if !self.take_checkin_budget() {
            debug!("Daily check-in limit reached, skipping {} check-in for timer {}", stage, id);
            return;
        }

        match self.sink.energy_checkin(id, stage).await {
            Some(level) => self.save_energy(id, stage, level).await,
            None => debug!("{} check-in for timer {} dismissed", stage, id),
        }
    }

    async fn save_energy(&self, id: &TimerId, stage: CheckinStage, level: EnergyLevel) {
        if !self.preferences().enable_energy_log {
            debug!("Energy logging disabled, not saving {} check-in", stage);
            return;
        }

        match self.backend.save_energy_log(id, stage, level).await {
            Ok(()) => info!("Saved {} energy {} for timer {}", stage, level.value(), id),
            Err(e) => {
                warn!("Failed to save energy log for timer {}: {}", id, e);
                self.notify(NoticeLevel::Warning, id, "Couldn't save your check-in");
            }
        }
    }

    /// End-of-session prompts: the energy check-in first, and the re-entry
    /// prompt only after that check-in has been answered and saved.
    fn spawn_session_end(&self, id: &TimerId) {
        let Some(controller) = self.me.upgrade() else {
            return;
        };
        let id = id.clone();
        let preferences = self.preferences();
        tokio::spawn(async move {
            if preferences.enable_end_checkin {
                controller.run_checkin(&id, CheckinStage::End).await;
            }
            if preferences.enable_reentry {
                controller.sink.show_reentry(&id);
            }
        });
    }
}

/// Set the start anchor so that `remaining_ms` is left on the clock at
/// `now`. A remainder longer than the local duration stretches the run.
fn anchor_remaining(timer: &mut Timer, now: DateTime<Utc>, remaining_ms: u64) {
    if remaining_ms > timer.duration_ms() {
        timer.duration_seconds = remaining_ms.div_ceil(1000);
    }

    let elapsed = timer.duration_ms().saturating_sub(remaining_ms);
    let started_at = i64::try_from(elapsed)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .and_then(|elapsed| now.checked_sub_signed(elapsed))
        .unwrap_or(now);
    timer.started_at = Some(started_at);
}

fn display_name(timer: &Timer) -> &str {
    if timer.name.is_empty() {
        "Timer"
    } else {
        &timer.name
    }
}
