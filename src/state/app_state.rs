//! Shared state for the HTTP surface

use std::{sync::Arc, time::Instant};

use crate::{controller::TimerController, services::PromptBoard, utils::format_compact};

/// Everything the HTTP handlers need
pub struct AppState {
    pub controller: Arc<TimerController>,
    /// Notices and pending energy prompts
    pub prompts: Arc<PromptBoard>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    pub fn new(
        controller: Arc<TimerController>,
        prompts: Arc<PromptBoard>,
        port: u16,
        host: String,
    ) -> Self {
        Self {
            controller,
            prompts,
            start_time: Instant::now(),
            port,
            host,
        }
    }

    /// Server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        format_compact(self.start_time.elapsed().as_millis() as u64)
    }
}
