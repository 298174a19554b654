use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub scheduler_enabled: bool,
    pub connected_sessions: usize,
}

/// Liveness check with a snapshot of the push side: whether the reminder
/// scheduler is running and how many client sessions are connected.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        scheduler_enabled: state.config.scheduler.enabled,
        connected_sessions: state.hub.session_count().await,
    };

    (StatusCode::OK, Json(response))
}
