//! In-process backend used when no backend URL is configured

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::{RemoteTimerState, TimerBackend};
use crate::{
    error::TimerError,
    state::{
        resolve, CheckinStage, EnergyLevel, Lifecycle, Preferences, Timer, TimerAction, TimerId,
    },
    utils::Clock,
};

/// One saved energy check-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnergyLogEntry {
    pub timer_id: TimerId,
    pub stage: CheckinStage,
    pub level: EnergyLevel,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    timers: HashMap<TimerId, Timer>,
    preferences: Preferences,
    energy_logs: Vec<EnergyLogEntry>,
}

/// Keeps timer rows in memory with the same anchor rules as the real
/// backend: pausing stamps `paused_at`, resuming shifts `started_at` forward
/// by the paused interval.
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl MemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            clock,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, timer: Timer) {
        self.state().timers.insert(timer.id.clone(), timer);
    }

    pub fn timer(&self, id: &TimerId) -> Option<Timer> {
        self.state().timers.get(id).cloned()
    }

    pub fn set_preferences(&self, preferences: Preferences) {
        self.state().preferences = preferences;
    }

    pub fn energy_logs(&self) -> Vec<EnergyLogEntry> {
        self.state().energy_logs.clone()
    }
}

#[async_trait]
impl TimerBackend for MemoryBackend {
    async fn get_timer_state(&self, id: &TimerId) -> Result<RemoteTimerState, TimerError> {
        let now = self.clock.now();
        let state = self.state();
        let timer = state
            .timers
            .get(id)
            .ok_or_else(|| TimerError::TimerNotFound(id.clone()))?;

        Ok(RemoteTimerState {
            lifecycle: timer.lifecycle,
            remaining_ms: resolve(timer, now),
        })
    }

    async fn update_timer(&self, id: &TimerId, action: TimerAction) -> Result<(), TimerError> {
        let now = self.clock.now();
        let mut state = self.state();
        let timer = state
            .timers
            .get_mut(id)
            .ok_or_else(|| TimerError::TimerNotFound(id.clone()))?;

        match action {
            TimerAction::Start => {
                timer.lifecycle = Lifecycle::Running;
                timer.started_at = Some(now);
                timer.paused_at = None;
            }
            TimerAction::Pause if timer.lifecycle == Lifecycle::Running => {
                timer.lifecycle = Lifecycle::Paused;
                timer.paused_at = Some(now);
            }
            TimerAction::Resume if timer.lifecycle == Lifecycle::Paused => {
                if let (Some(started_at), Some(paused_at)) = (timer.started_at, timer.paused_at) {
                    timer.started_at = Some(started_at + (now - paused_at));
                }
                timer.lifecycle = Lifecycle::Running;
                timer.paused_at = None;
            }
            TimerAction::Stop => {
                timer.lifecycle = Lifecycle::Stopped;
                timer.started_at = None;
                timer.paused_at = None;
            }
            TimerAction::Pause | TimerAction::Resume => {
                debug!("Ignoring {} for timer {} while {}", action, id, timer.lifecycle);
            }
        }

        info!("Timer {} {} recorded", id, action);
        Ok(())
    }

    async fn get_user_preferences(&self) -> Result<Preferences, TimerError> {
        Ok(self.state().preferences)
    }

    async fn save_energy_log(
        &self,
        id: &TimerId,
        stage: CheckinStage,
        level: EnergyLevel,
    ) -> Result<(), TimerError> {
        let logged_at = self.clock.now();
        let mut state = self.state();

        if !state.timers.contains_key(id) {
            return Err(TimerError::TimerNotFound(id.clone()));
        }
        if !state.preferences.checkin_enabled(stage) {
            return Err(TimerError::PersistenceUnavailable(format!(
                "{} check-in is disabled for this user",
                stage
            )));
        }

        state.energy_logs.push(EnergyLogEntry {
            timer_id: id.clone(),
            stage,
            level,
            logged_at,
        });
        Ok(())
    }
}
