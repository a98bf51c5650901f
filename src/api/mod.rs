//! HTTP API module
//!
//! Thin handlers over the timer controller plus the prompt board that
//! answers energy check-ins.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", get(timers_handler))
        .route("/timers/:id", get(timer_handler))
        .route("/timers/:id/start", post(start_handler))
        .route("/timers/:id/pause", post(pause_handler))
        .route("/timers/:id/resume", post(resume_handler))
        .route("/timers/:id/stop", post(stop_handler))
        .route("/timers/:id/checkin", post(checkin_handler))
        .route("/prompts", get(prompts_handler))
        .route("/notifications", get(notifications_handler))
        .route("/preferences/refresh", post(refresh_preferences_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
