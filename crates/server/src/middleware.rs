use crate::error::ServerError;
use crate::state::ServerState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied request id we adopt; anything longer is replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request ID as stored in request extensions
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Gate `/api/*` behind the configured keys. Open when none are configured.
pub async fn api_key_auth(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    if !state.config.auth_enabled() {
        return Ok(next.run(request).await);
    }

    match presented_key(request.headers()) {
        Some(key) if state.is_valid_api_key(key) => {}
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Rejected request with unknown API key");
            return Err(ServerError::Authentication("Invalid API key".to_string()));
        }
        None => {
            return Err(ServerError::Authentication(
                "API key required. Provide it in 'X-API-Key' or 'Authorization: Bearer <key>' header"
                    .to_string(),
            ));
        }
    }

    Ok(next.run(request).await)
}

/// `X-API-Key` wins over `Authorization: Bearer`.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key.trim()).filter(|k| !k.is_empty());
    }
    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// Tag every request with an id, run it inside a span carrying that id, log
/// its outcome and echo the id back in `x-request-id`.
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let id = resolve_request_id(request.headers());
    request.extensions_mut().insert(RequestId(id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let start = Instant::now();
    let mut response = async {
        tracing::debug!("Request started");
        let response = next.run(request).await;
        tracing::info!(
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Adopt the caller's id when it is short printable ASCII, otherwise mint one.
fn resolve_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| {
            !id.is_empty()
                && id.len() <= MAX_REQUEST_ID_LEN
                && id.chars().all(|c| c.is_ascii_graphic())
        })
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
