//! Persistence collaborator contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::TimerError,
    state::{CheckinStage, EnergyLevel, Lifecycle, Preferences, TimerAction, TimerId},
};

/// Authoritative state reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTimerState {
    pub lifecycle: Lifecycle,
    pub remaining_ms: u64,
}

/// Backend that owns timer rows, preferences and energy logs.
///
/// Every call may fail with [`TimerError::PersistenceUnavailable`]; callers
/// treat that as recoverable.
#[async_trait]
pub trait TimerBackend: Send + Sync {
    /// Query, no side effects
    async fn get_timer_state(&self, id: &TimerId) -> Result<RemoteTimerState, TimerError>;

    /// Record a lifecycle action. Repeating an action is harmless.
    async fn update_timer(&self, id: &TimerId, action: TimerAction) -> Result<(), TimerError>;

    async fn get_user_preferences(&self) -> Result<Preferences, TimerError>;

    async fn save_energy_log(
        &self,
        id: &TimerId,
        stage: CheckinStage,
        level: EnergyLevel,
    ) -> Result<(), TimerError>;
}
