//! Load-time reconciliation with the backend

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    controller::TimerController,
    services::{RemoteTimerState, TimerBackend},
    state::{try_resolve, Lifecycle, Timer, TimerDescriptor},
};

/// What a reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub resumed: usize,
    pub paused: usize,
    pub stopped: usize,
    /// Timers restored from their descriptor because the fetch failed
    pub fallbacks: usize,
}

/// Brings local sessions in line with the backend once per process.
pub struct ServerReconciler {
    controller: Arc<TimerController>,
    backend: Arc<dyn TimerBackend>,
    done: AtomicBool,
}

impl ServerReconciler {
    pub fn new(controller: Arc<TimerController>, backend: Arc<dyn TimerBackend>) -> Self {
        Self {
            controller,
            backend,
            done: AtomicBool::new(false),
        }
    }

    /// Restore every visible timer from the backend's state, falling back to
    /// the descriptor's own anchors when the fetch fails. Only the first call
    /// does anything; later calls return `None`.
    pub async fn reconcile_on_load(&self, timers: &[TimerDescriptor]) -> Option<ReconcileReport> {
        if self.done.swap(true, Ordering::SeqCst) {
            debug!("Reconciliation already ran, skipping");
            return None;
        }

        info!("Reconciling {} timers with the backend", timers.len());
        self.controller.refresh_preferences().await;

        let mut report = ReconcileReport::default();
        for descriptor in timers {
            self.controller.register(Timer::stopped(
                descriptor.id.clone(),
                descriptor.name.clone(),
                descriptor.duration_seconds,
            ));

            let state = match self.backend.get_timer_state(&descriptor.id).await {
                Ok(state) => state,
                Err(e) => {
                    warn!("Falling back to local anchors for timer {}: {}", descriptor.id, e);
                    report.fallbacks += 1;
                    self.estimate(descriptor)
                }
            };

            match state.lifecycle {
                Lifecycle::Running => {
                    self.controller
                        .resume_from_remaining(&descriptor.id, state.remaining_ms);
                    report.resumed += 1;
                }
                Lifecycle::Paused => {
                    self.controller.show_paused(&descriptor.id, state.remaining_ms);
                    report.paused += 1;
                }
                Lifecycle::Stopped => {
                    self.controller.show_stopped(&descriptor.id);
                    report.stopped += 1;
                }
            }
        }

        info!(
            "Reconciled timers: {} running, {} paused, {} stopped ({} from fallback)",
            report.resumed, report.paused, report.stopped, report.fallbacks
        );
        Some(report)
    }

    /// What the backend would have reported, derived from the descriptor.
    /// Unusable anchors show the timer as stopped.
    fn estimate(&self, descriptor: &TimerDescriptor) -> RemoteTimerState {
        let now = self.controller.store().clock().now();
        let resolved = descriptor
            .to_timer()
            .and_then(|timer| try_resolve(&timer, now).map(|remaining| (timer, remaining)));
        match resolved {
            Ok((timer, remaining_ms)) => RemoteTimerState {
                lifecycle: timer.lifecycle,
                remaining_ms,
            },
            Err(e) => {
                warn!("Showing timer {} as stopped: {}", descriptor.id, e);
                RemoteTimerState {
                    lifecycle: Lifecycle::Stopped,
                    remaining_ms: 0,
                }
            }
        }
    }
}
