//! Error surface of the orchestration core.
//!
//! Every failure of an outbound call is converted into an
//! [`OrchestrationError`] value; nothing panics or propagates past the
//! orchestrator on a remote failure. Only [`ConfigError`] is meant to be
//! fatal, and only at startup.
//!
//! | Error | Status | Raised when |
//! |-------|--------|-------------|
//! | [`InvalidInput`](OrchestrationError::InvalidInput) | none | request fields missing or malformed, before any network call |
//! | [`TransportFailure`](OrchestrationError::TransportFailure) | none | timeout, DNS, refused connection, undecodable body on a 2xx |
//! | [`BackendError`](OrchestrationError::BackendError) | upstream | the backend answered with a non-2xx status |

use thiserror::Error;

/// Failure of a single detection submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("detection backend returned {status}: {message}")]
    BackendError { status: u16, message: String },
}

impl OrchestrationError {
    /// Upstream HTTP status, present only for [`BackendError`](Self::BackendError).
    pub fn http_status(&self) -> Option<u16> {
        match self {
            OrchestrationError::BackendError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            OrchestrationError::InvalidInput(msg)
            | OrchestrationError::TransportFailure(msg)
            | OrchestrationError::BackendError { message: msg, .. } => msg,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestrationError::InvalidInput(_) => "invalid_input",
            OrchestrationError::TransportFailure(_) => "transport_failure",
            OrchestrationError::BackendError { .. } => "backend_error",
        }
    }
}

/// Reasons the image encoder refuses an input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("not an image type: {0}")]
    NotAnImage(String),

    #[error("image is empty")]
    Empty,

    #[error("image exceeds maximum size ({size} > {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("image could not be read: {0}")]
    Unreadable(String),

    #[error("payload is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("no image selected")]
    NothingSelected,
}

impl From<EncodeError> for OrchestrationError {
    fn from(err: EncodeError) -> Self {
        OrchestrationError::InvalidInput(err.to_string())
    }
}

/// Invalid internal configuration. The only error class allowed to abort
/// the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid URL for {name}: {reason}")]
    InvalidUrl { name: String, reason: String },

    #[error("timeout for {0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("HTTP client could not be built: {0}")]
    Client(String),

    #[error("max image size must be between 1 and {max} bytes, got {value}")]
    ImageLimit { value: usize, max: usize },
}
