//! API route handlers
//!
//! - `health`: gateway liveness, backend health aggregation, metrics
//! - `detect`: face detection dispatch

pub mod detect;
pub mod health;

use crate::error::ServerError;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info
///
/// ```json
/// {
///   "name": "Facegate Server",
///   "version": "0.1.0",
///   "endpoints": ["..."],
///   "target_formats": ["jpeg", "png", "webp"]
/// }
/// ```
pub async fn api_info() -> impl IntoResponse {
    Json(json!({
        "name": "Facegate Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/api/detect",
            "/api/health",
            "/health",
            "/metrics"
        ],
        "target_formats": facegate::TargetFormat::ALL,
    }))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
