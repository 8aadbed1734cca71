use crate::error::{ServerError, ServerResult};
use crate::state::{ServerMetadata, ServerState};
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::Json;
use facegate::ServiceStatus;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Pin the start time; called once at startup
pub fn mark_started() {
    once_cell::sync::Lazy::force(&SERVER_START_TIME);
}

/// Health check endpoint (liveness of the gateway itself)
pub async fn health_check() -> impl IntoResponse {
    let metadata = ServerMetadata {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime_seconds(),
    };

    Json(json!({
        "status": "healthy",
        "service": "facegate-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": metadata.version,
        "uptime_seconds": metadata.uptime_seconds,
    }))
}

/// Aggregated backend status
#[derive(Debug, Serialize, Deserialize)]
pub struct ServicesHealthResponse {
    pub services: Vec<ServiceStatus>,
    pub checked_at: String,
}

/// Probe every configured backend once and report one status per service,
/// in configuration order. Never served from cache.
pub async fn services_health(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let services = state.health.check_all(&state.services).await;

    let healthy = services.iter().filter(|s| s.is_healthy()).count();
    tracing::debug!(healthy, total = services.len(), "Backend health cycle complete");

    (
        [(CACHE_CONTROL, "no-store")],
        Json(ServicesHealthResponse {
            services,
            checked_at: chrono::Utc::now().to_rfc3339(),
        }),
    )
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let handle = state.metrics.as_ref().ok_or(ServerError::NotFound)?;
    Ok((
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
