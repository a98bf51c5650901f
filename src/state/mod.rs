//! State management module
//!
//! Timer data model, remaining-time resolution and the per-timer session
//! registry.

pub mod app_state;
pub mod resolver;
pub mod session_store;
pub mod timer;

// Re-export main types
pub use app_state::AppState;
pub use resolver::{remaining_until, resolve, try_resolve};
pub use session_store::{TimerSessionStore, TimerView};
pub use timer::{
    parse_anchor, CheckinStage, EnergyLevel, Lifecycle, Preferences, Timer, TimerAction,
    TimerDescriptor, TimerId, MAX_DURATION_SECONDS,
};
