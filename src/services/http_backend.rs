//! HTTP client for the timer persistence backend

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RemoteTimerState, TimerBackend};
use crate::{
    error::TimerError,
    state::{CheckinStage, EnergyLevel, Lifecycle, Preferences, TimerAction, TimerId},
};

#[derive(Debug, Deserialize)]
struct TimerStateResponse {
    #[serde(default)]
    success: bool,
    timer: Option<WireTimer>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTimer {
    is_running: u8,
    remaining_time: u64,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    #[serde(default)]
    success: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PreferencesResponse {
    #[serde(default)]
    success: bool,
    preferences: Option<Preferences>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    action: &'a str,
}

#[derive(Debug, Serialize)]
struct EnergyLogRequest<'a> {
    timer_id: &'a str,
    stage: CheckinStage,
    energy_level: EnergyLevel,
}

/// Talks to the Flask backend's JSON endpoints
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    session_cookie: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, session_cookie: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_cookie,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session_cookie {
            Some(cookie) => request.header(header::COOKIE, cookie),
            None => request,
        }
    }
}

fn rejected(error: Option<String>, fallback: &str) -> TimerError {
    TimerError::PersistenceUnavailable(error.unwrap_or_else(|| fallback.to_string()))
}

#[async_trait]
impl TimerBackend for HttpBackend {
    async fn get_timer_state(&self, id: &TimerId) -> Result<RemoteTimerState, TimerError> {
        let url = self.url(&format!("/get_timer_state/{}", id));
        debug!("GET {}", url);

        let response: TimerStateResponse = self
            .with_session(self.client.get(&url))
            .send()
            .await?
            .json()
            .await?;

        match response.timer {
            Some(timer) if response.success => {
                let lifecycle = Lifecycle::from_code(timer.is_running).ok_or_else(|| {
                    TimerError::unavailable(format!("unknown is_running code {}", timer.is_running))
                })?;
                Ok(RemoteTimerState {
                    lifecycle,
                    remaining_ms: timer.remaining_time,
                })
            }
            _ => Err(rejected(response.error, "timer state unavailable")),
        }
    }

    async fn update_timer(&self, id: &TimerId, action: TimerAction) -> Result<(), TimerError> {
        let url = self.url(&format!("/update_timer/{}", id));
        debug!("POST {} action={}", url, action);

        let response: UpdateResponse = self
            .with_session(self.client.post(&url))
            .json(&UpdateRequest {
                action: action.as_str(),
            })
            .send()
            .await?
            .json()
            .await?;

        if response.success {
            Ok(())
        } else {
            Err(rejected(response.error, "timer update failed"))
        }
    }

    async fn get_user_preferences(&self) -> Result<Preferences, TimerError> {
        let url = self.url("/get_user_preferences");
        debug!("GET {}", url);

        let response: PreferencesResponse = self
            .with_session(self.client.get(&url))
            .send()
            .await?
            .json()
            .await?;

        match response.preferences {
            Some(preferences) if response.success => Ok(preferences),
            _ => Err(rejected(response.error, "preferences unavailable")),
        }
    }

    async fn save_energy_log(
        &self,
        id: &TimerId,
        stage: CheckinStage,
        level: EnergyLevel,
    ) -> Result<(), TimerError> {
        let url = self.url("/log_energy");
        debug!("POST {} timer={} stage={}", url, id, stage);

        let response: UpdateResponse = self
            .with_session(self.client.post(&url))
            .json(&EnergyLogRequest {
                timer_id: id.as_str(),
                stage,
                energy_level: level,
            })
            .send()
            .await?
            .json()
            .await?;

        if response.success {
            Ok(())
        } else {
            Err(rejected(response.error, "energy log rejected"))
        }
    }
}
