//! Utility functions module
//!
//! Display formatting, time sources and signal handling.

pub mod clock;
pub mod format;
pub mod signals;

// Re-export main functions
pub use clock::{Clock, SystemClock, TokioClock};
pub use format::{format_clock, format_compact, format_countdown, COMPLETE};
pub use signals::shutdown_signal;
