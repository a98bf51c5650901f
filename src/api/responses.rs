//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    controller::Outcome,
    services::{Notice, PendingPrompt},
    state::{CheckinStage, Preferences, TimerView},
};

/// Body of `POST /timers/:id/start`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub duration_seconds: u64,
}

/// Body of `POST /timers/:id/checkin`; a missing level dismisses the prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinRequest {
    pub stage: CheckinStage,
    #[serde(default)]
    pub level: Option<u8>,
}

/// Response for transition endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub status: Outcome,
    pub timestamp: DateTime<Utc>,
    pub timer: Option<TimerView>,
}

impl TransitionResponse {
    pub fn new(status: Outcome, timer: Option<TimerView>) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
            timer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimersResponse {
    pub timers: Vec<TimerView>,
    pub active_countdowns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinResponse {
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsResponse {
    pub prompts: Vec<PendingPrompt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesResponse {
    pub preferences: Preferences,
}

/// Error body for rejected requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime: String,
    pub host: String,
    pub port: u16,
}

impl HealthResponse {
    pub fn ok(uptime: String, host: String, port: u16) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime,
            host,
            port,
        }
    }
}
