//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{info, warn};

use super::responses::{
    CheckinRequest, CheckinResponse, ErrorResponse, HealthResponse, NotificationsResponse,
    PreferencesResponse, PromptsResponse, StartRequest, TimersResponse, TransitionResponse,
};
use crate::{
    controller::Outcome,
    state::{AppState, EnergyLevel, Timer, TimerId},
};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn known_timer(state: &AppState, id: &TimerId) -> Result<(), ApiError> {
    match state.controller.view(id) {
        Some(_) => Ok(()),
        None => Err(error(StatusCode::NOT_FOUND, format!("Timer not found: {}", id))),
    }
}

fn transition_response(state: &AppState, id: &TimerId, outcome: Outcome) -> Json<TransitionResponse> {
    Json(TransitionResponse::new(outcome, state.controller.view(id)))
}

/// Handle POST /timers/:id/start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
    Json(request): Json<StartRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    Timer::validate_duration(request.duration_seconds)
        .map_err(|e| error(StatusCode::BAD_REQUEST, format!("duration_seconds: {}", e)))?;

    let outcome = state.controller.start(&id, request.duration_seconds);
    info!("Start requested for timer {}: {:?}", id, outcome);
    Ok(transition_response(&state, &id, outcome))
}

/// Handle POST /timers/:id/pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<TransitionResponse>, ApiError> {
    known_timer(&state, &id)?;
    let outcome = state.controller.pause(&id);
    Ok(transition_response(&state, &id, outcome))
}

/// Handle POST /timers/:id/resume
pub async fn resume_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<TransitionResponse>, ApiError> {
    known_timer(&state, &id)?;
    let outcome = state.controller.resume(&id);
    Ok(transition_response(&state, &id, outcome))
}

/// Handle POST /timers/:id/stop
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<TransitionResponse>, ApiError> {
    known_timer(&state, &id)?;
    let outcome = state.controller.stop(&id);
    Ok(transition_response(&state, &id, outcome))
}

/// Handle GET /timers
pub async fn timers_handler(State(state): State<Arc<AppState>>) -> Json<TimersResponse> {
    Json(TimersResponse {
        timers: state.controller.views(),
        active_countdowns: state.controller.store().active_countdowns(),
    })
}

/// Handle GET /timers/:id
pub async fn timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<crate::state::TimerView>, ApiError> {
    state
        .controller
        .view(&id)
        .map(Json)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("Timer not found: {}", id)))
}

/// Handle POST /timers/:id/checkin - answer or dismiss a pending prompt
pub async fn checkin_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
    Json(request): Json<CheckinRequest>,
) -> Result<Json<CheckinResponse>, ApiError> {
    let level = request
        .level
        .map(EnergyLevel::try_from)
        .transpose()
        .map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let accepted = state.prompts.answer(&id, request.stage, level);
    if !accepted {
        warn!("No pending {} check-in for timer {}", request.stage, id);
        return Err(error(
            StatusCode::NOT_FOUND,
            format!("No pending {} check-in for timer {}", request.stage, id),
        ));
    }
    Ok(Json(CheckinResponse { accepted }))
}

/// Handle GET /prompts
pub async fn prompts_handler(State(state): State<Arc<AppState>>) -> Json<PromptsResponse> {
    Json(PromptsResponse {
        prompts: state.prompts.pending_prompts(),
    })
}

/// Handle GET /notifications
pub async fn notifications_handler(State(state): State<Arc<AppState>>) -> Json<NotificationsResponse> {
    Json(NotificationsResponse {
        notices: state.prompts.recent_notices(),
    })
}

/// Handle POST /preferences/refresh
pub async fn refresh_preferences_handler(
    State(state): State<Arc<AppState>>,
) -> Json<PreferencesResponse> {
    Json(PreferencesResponse {
        preferences: state.controller.refresh_preferences().await,
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(
        state.get_uptime(),
        state.host.clone(),
        state.port,
    ))
}
