//! HTTP surface: subscriber WebSocket plus health and stats endpoints.

use crate::session::hub::HubHandle;
use crate::transcribe::stats::ModelStats;
use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Shared state for the HTTP handlers.
pub struct AppState {
    pub hub: HubHandle,
    pub stats: Arc<ModelStats>,
}

/// Builds the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(crate::server::ws::ws_handler))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.hub.status().await {
        Some(status) => {
            let uptime = (Utc::now() - status.started_at).num_seconds().max(0);
            Json(json!({
                "status": "healthy",
                "recording": status.recording,
                "subscribers": status.subscribers,
                "uptime_seconds": uptime,
            }))
        }
        None => Json(json!({ "status": "stopped" })),
    }
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let session = state.hub.status().await;
    Json(json!({
        "session": session.map(|status| json!({
            "recording": status.recording,
            "focus": status.focus,
            "subscribers": status.subscribers,
            "transcriptions": status.transcriptions,
            "questions_received": status.questions_received,
        })),
        "models": state.stats.snapshot(),
    }))
}

/// Binds and serves until `shutdown` resolves.
pub async fn serve(
    router: Router,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| crate::error::ColloquyError::Server {
            message: format!("failed to bind {host}:{port}: {e}"),
        })?;
    tracing::info!("subscriber endpoint listening on {host}:{port}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::ColloquyError::Server {
            message: e.to_string(),
        })
}
