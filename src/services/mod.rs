//! External collaborators
//!
//! The persistence backend (HTTP or in-memory) and the notification surface
//! for toasts and prompts.

pub mod backend;
pub mod http_backend;
pub mod memory_backend;
pub mod notifications;

// Re-export main types
pub use backend::{RemoteTimerState, TimerBackend};
pub use http_backend::HttpBackend;
pub use memory_backend::{EnergyLogEntry, MemoryBackend};
pub use notifications::{
    Notice, NoticeKind, NoticeLevel, NotificationSink, PendingPrompt, PromptBoard,
};
