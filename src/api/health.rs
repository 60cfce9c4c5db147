//! Health check endpoint

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "draining" once shutdown has begun
    pub status: &'static str,
    pub version: &'static str,
    /// Connected devices
    pub sessions: usize,
    /// Connected devices that missed their last pong
    pub stale_sessions: usize,
}

/// Liveness probe - is the service running?
async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let registry = &state.registry;
    Json(HealthResponse {
        status: if registry.is_accepting() { "ok" } else { "draining" },
        version: env!("CARGO_PKG_VERSION"),
        sessions: registry.len().await,
        stale_sessions: registry.stale_count().await,
    })
}

/// Build health router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}
