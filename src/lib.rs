//! Flow Timer - focus-session timers with server-anchored countdowns
//!
//! Tracks concurrently running flow timers, derives remaining time from the
//! backend's anchors instead of local tick counting, raises energy check-ins
//! and re-entry prompts at the right transitions, and reconciles with the
//! backend on startup.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::{Config, ControllerSettings};
pub use controller::{Outcome, TimerController};
pub use error::TimerError;
pub use state::{AppState, TimerSessionStore};
pub use tasks::ServerReconciler;
pub use utils::signals::shutdown_signal;
