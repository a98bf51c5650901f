//! Flow Timer - focus-session timers with server-anchored countdowns
//!
//! This is the main entry point for the flow-timer daemon.

use std::{path::Path, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use flow_timer::{
    api::create_router,
    config::Config,
    controller::TimerController,
    services::{HttpBackend, MemoryBackend, PromptBoard, TimerBackend},
    state::{AppState, TimerDescriptor, TimerSessionStore},
    tasks::ServerReconciler,
    utils::{shutdown_signal, Clock, SystemClock},
};

fn load_descriptors(path: Option<&Path>) -> anyhow::Result<Vec<TimerDescriptor>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read timers file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse timers file {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("flow_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting flow-timer v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, backend={}, midpoint floor={}min",
        config.host,
        config.port,
        config.backend_url.as_deref().unwrap_or("offline"),
        config.midpoint_floor_minutes
    );

    let descriptors = load_descriptors(config.timers.as_deref())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let backend: Arc<dyn TimerBackend> = match &config.backend_url {
        Some(url) => Arc::new(HttpBackend::new(url.clone(), config.session_cookie.clone())),
        None => {
            let memory = MemoryBackend::new(Arc::clone(&clock));
            for descriptor in &descriptors {
                match descriptor.to_timer() {
                    Ok(timer) => memory.insert(timer),
                    Err(e) => tracing::warn!("Skipping timer {}: {}", descriptor.id, e),
                }
            }
            Arc::new(memory)
        }
    };

    let prompts = Arc::new(PromptBoard::new(Arc::clone(&clock)));
    let store = Arc::new(TimerSessionStore::new(Arc::clone(&clock)));
    let controller = TimerController::new(
        Arc::clone(&store),
        Arc::clone(&backend),
        prompts.clone(),
        config.controller_settings(),
    );

    // Restore timers before accepting requests
    let reconciler = ServerReconciler::new(Arc::clone(&controller), backend);
    reconciler.reconcile_on_load(&descriptors).await;

    let state = Arc::new(AppState::new(
        controller,
        prompts,
        config.port,
        config.host.clone(),
    ));
    let app = create_router(state);

    let addr = config.address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /timers                 - List timers and remaining time");
    info!("  POST /timers/:id/start       - Start a run ({{\"duration_seconds\": n}})");
    info!("  POST /timers/:id/pause       - Pause a running timer");
    info!("  POST /timers/:id/resume      - Resume a paused timer");
    info!("  POST /timers/:id/stop        - Stop a timer");
    info!("  POST /timers/:id/checkin     - Answer an energy check-in");
    info!("  GET  /prompts                - Pending check-ins");
    info!("  GET  /notifications          - Recent notices");
    info!("  GET  /health                 - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    store.cancel_all();
    info!("Server shutdown complete");
    Ok(())
}
