use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use facegate::{ConfigError, OrchestrationError};
use serde::{Deserialize, Serialize};

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Failure reported by the orchestration core.
    #[error("{}", upstream_message(.0))]
    Upstream(OrchestrationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

fn upstream_message(err: &OrchestrationError) -> String {
    match err {
        OrchestrationError::InvalidInput(msg) => msg.clone(),
        OrchestrationError::TransportFailure(msg) => format!("Detection service unavailable: {msg}"),
        OrchestrationError::BackendError { message, .. } => {
            format!("Detection service error: {message}")
        }
    }
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Upstream(err) => match err {
                OrchestrationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                // Mirror the backend's status; fall back to 500 for
                // anything that is not a valid error status.
                OrchestrationError::BackendError { status, .. } => StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                OrchestrationError::TransportFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::Authentication(_) => "AUTH_FAILED",
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ServerError::Upstream(OrchestrationError::InvalidInput(_)) => "INVALID_INPUT",
            ServerError::Upstream(OrchestrationError::TransportFailure(_)) => "TRANSPORT_FAILURE",
            ServerError::Upstream(OrchestrationError::BackendError { .. }) => "BACKEND_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let upstream_status = match &self {
            ServerError::Upstream(err) => err.http_status(),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                upstream_status,
            },
        });

        (status, body).into_response()
    }
}

impl From<OrchestrationError> for ServerError {
    fn from(err: OrchestrationError) -> Self {
        ServerError::Upstream(err)
    }
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(rejection.body_text())
        } else {
            ServerError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
        }
    }
}
