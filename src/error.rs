//! Error types for timer session operations

use crate::state::{Lifecycle, TimerAction, TimerId};

/// All errors that can occur while driving a timer session.
///
/// None of these are fatal to a running countdown. Persistence failures are
/// surfaced as warnings, bad anchors degrade to a stopped display and illegal
/// transitions are ignored by the controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("Persistence backend unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Invalid {field} anchor: {value:?}")]
    InvalidAnchor { field: &'static str, value: String },

    #[error("Cannot {action} timer {id} while {state}")]
    IllegalTransition {
        id: TimerId,
        action: TimerAction,
        state: Lifecycle,
    },

    #[error("Session length must be between 1 and 14400 seconds, got {0}")]
    InvalidDuration(u64),

    #[error("Energy level must be between 1 and 10, got {0}")]
    InvalidEnergyLevel(u8),

    #[error("Timer not found: {0}")]
    TimerNotFound(TimerId),
}

impl TimerError {
    /// Shorthand for wrapping any transport/backend error
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        TimerError::PersistenceUnavailable(err.to_string())
    }

    /// Missing anchor, reported with an empty value
    pub fn missing_anchor(field: &'static str) -> Self {
        TimerError::InvalidAnchor {
            field,
            value: String::new(),
        }
    }
}

impl From<reqwest::Error> for TimerError {
    fn from(err: reqwest::Error) -> Self {
        TimerError::unavailable(err)
    }
}
