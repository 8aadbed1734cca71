//! Detection orchestrator.
//!
//! [`Detector::detect`] issues exactly one request to the detection backend
//! per call. There is no retry loop and no result cache: a failed call is
//! reported to the caller, who may resubmit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::{ConfigError, OrchestrationError};
use crate::metrics_recorder;
use crate::types::{DetectFacesResponse, DetectionRequest, DetectionResult, EncodedImage, TargetFormat};

/// Longest upstream error body echoed back to callers.
const MAX_ERROR_MESSAGE_CHARS: usize = 512;

/// Transport to the detection backend.
///
/// Implementations perform a single exchange and classify its failure; they
/// never retry.
#[async_trait]
pub trait DetectionBackend: Send + Sync {
    async fn detect_faces(
        &self,
        request: &DetectionRequest,
    ) -> Result<DetectFacesResponse, OrchestrationError>;
}

/// `POST <bff>/detect-faces` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpDetectionBackend {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpDetectionBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint).map_err(|e| ConfigError::InvalidUrl {
            name: "detection endpoint".to_string(),
            reason: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn from_config(cfg: &BackendConfig) -> Result<Self, ConfigError> {
        Self::new(cfg.detect_endpoint(), cfg.detect_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, err: &reqwest::Error) -> OrchestrationError {
        if err.is_timeout() {
            OrchestrationError::TransportFailure(format!(
                "detection backend did not answer within {}ms",
                self.timeout.as_millis()
            ))
        } else {
            OrchestrationError::TransportFailure(format!(
                "detection backend unreachable: {err}"
            ))
        }
    }
}

#[async_trait]
impl DetectionBackend for HttpDetectionBackend {
    async fn detect_faces(
        &self,
        request: &DetectionRequest,
    ) -> Result<DetectFacesResponse, OrchestrationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("unknown error");
            return Err(OrchestrationError::BackendError {
                status: status.as_u16(),
                message: extract_error_message(&body, fallback),
            });
        }

        serde_json::from_slice::<DetectFacesResponse>(&body).map_err(|e| {
            OrchestrationError::TransportFailure(format!(
                "detection backend sent a malformed response: {e}"
            ))
        })
    }
}

/// Best-effort message from an error body: FastAPI-style `detail`, then
/// `error` / `message`, then the raw text, then `fallback`.
pub(crate) fn extract_error_message(body: &[u8], fallback: &str) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        for key in ["detail", "error", "message"] {
            match value.get(key) {
                Some(Value::String(msg)) if !msg.trim().is_empty() => {
                    return truncate(msg.trim());
                }
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(msg)) = inner.get("message") {
                        if !msg.trim().is_empty() {
                            return truncate(msg.trim());
                        }
                    }
                }
                _ => {}
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        fallback.to_string()
    } else {
        truncate(text)
    }
}

fn truncate(msg: &str) -> String {
    match msg.char_indices().nth(MAX_ERROR_MESSAGE_CHARS) {
        Some((idx, _)) => format!("{}...", &msg[..idx]),
        None => msg.to_string(),
    }
}

/// Coordinates one detection request end-to-end. Holds no per-request
/// state, so a single instance can be shared freely.
#[derive(Clone)]
pub struct Detector {
    backend: Arc<dyn DetectionBackend>,
    timeout: Duration,
}

impl Detector {
    /// `timeout` bounds the whole exchange, independent of any limit the
    /// backend applies on its own.
    pub fn new(backend: Arc<dyn DetectionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Detector talking HTTP to the configured BFF.
    pub fn http(cfg: &BackendConfig) -> Result<Self, ConfigError> {
        let backend = HttpDetectionBackend::from_config(cfg)?;
        Ok(Self::new(Arc::new(backend), cfg.detect_timeout()))
    }

    /// Send `image` for detection, asking for faces in `target_format`.
    ///
    /// The returned `file_type` is always `target_format`, whatever the
    /// backend claims. A reply without `cropped_faces` yields no faces.
    pub async fn detect(
        &self,
        image: &EncodedImage,
        target_format: TargetFormat,
    ) -> Result<DetectionResult, OrchestrationError> {
        let start = Instant::now();
        let result = self.dispatch(image, target_format).await;
        let latency = start.elapsed();

        match &result {
            Ok(found) => info!(
                faces = found.faces.len(),
                format = %target_format,
                elapsed_ms = latency.as_millis() as u64,
                "detection completed"
            ),
            Err(err) => warn!(
                kind = err.kind(),
                status = err.http_status(),
                error = %err,
                elapsed_ms = latency.as_millis() as u64,
                "detection failed"
            ),
        }
        if let Some(recorder) = metrics_recorder() {
            recorder.record_detect(latency, result.as_ref().map(|r| r.faces.len()));
        }
        result
    }

    async fn dispatch(
        &self,
        image: &EncodedImage,
        target_format: TargetFormat,
    ) -> Result<DetectionResult, OrchestrationError> {
        if image.payload().is_empty() {
            return Err(OrchestrationError::InvalidInput("image payload is empty".into()));
        }
        let request = DetectionRequest::new(image, target_format);
        debug!(
            media_type = image.media_type(),
            payload_len = image.payload().len(),
            format = %target_format,
            "dispatching detection request"
        );

        let reply = tokio::time::timeout(self.timeout, self.backend.detect_faces(&request))
            .await
            .map_err(|_| {
                OrchestrationError::TransportFailure(format!(
                    "detection backend did not answer within {}ms",
                    self.timeout.as_millis()
                ))
            })??;

        Ok(DetectionResult {
            faces: reply.cropped_faces.unwrap_or_default(),
            file_type: target_format,
        })
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
