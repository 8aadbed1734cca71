//! Multi-service health aggregation.
//!
//! Probes run concurrently on the caller's task; each one is bounded by the
//! configured timeout and owns its own request, so a slow or dead service
//! never holds up the others. Output order always equals input order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use thiserror::Error;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::ConfigError;
use crate::metrics_recorder;
use crate::types::{HealthState, ServiceEndpoint, ServiceStatus};

/// Reported name for a probe whose service name is blank.
pub const UNKNOWN_SERVICE: &str = "Unknown Service";

/// Why a probe counted as failed. Collapsed to [`HealthState::Failed`]
/// before it leaves the aggregator; kept only for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("invalid probe URL: {0}")]
    InvalidUrl(String),

    #[error("unhealthy status {0}")]
    Status(u16),

    #[error("probe timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

/// A single liveness check against one URL.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<(), ProbeError>;
}

/// `GET <service>/health`; any 2xx is healthy. Every request asks
/// intermediaries not to serve a cached answer.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<(), ProbeError> {
        let url = reqwest::Url::parse(url).map_err(|e| ProbeError::InvalidUrl(e.to_string()))?;
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout
                } else {
                    ProbeError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

/// Fans out one probe per service and gathers a fresh status set.
#[derive(Clone)]
pub struct HealthAggregator {
    probe: Arc<dyn HealthProbe>,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new(probe: Arc<dyn HealthProbe>, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    pub fn http(cfg: &BackendConfig) -> Result<Self, ConfigError> {
        let probe = HttpProbe::new(cfg.probe_timeout())?;
        Ok(Self::new(Arc::new(probe), cfg.probe_timeout()))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Placeholder set shown before a cycle resolves: every service `Loading`.
    pub fn pending(services: &[ServiceEndpoint]) -> Vec<ServiceStatus> {
        services
            .iter()
            .map(|s| ServiceStatus::new(display_name(s), HealthState::Loading))
            .collect()
    }

    /// Probe every service once. Never fails and never caches: the result
    /// has the same length and order as `services`.
    pub async fn check_all(&self, services: &[ServiceEndpoint]) -> Vec<ServiceStatus> {
        join_all(services.iter().map(|service| self.check_one(service))).await
    }

    async fn check_one(&self, service: &ServiceEndpoint) -> ServiceStatus {
        let name = display_name(service);
        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, self.probe.probe(&service.probe_url)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        };
        let latency = start.elapsed();

        let status = match outcome {
            Ok(()) => HealthState::Healthy,
            Err(err) => {
                debug!(
                    service = name,
                    url = %service.probe_url,
                    reason = %err,
                    elapsed_ms = latency.as_millis() as u64,
                    "health probe failed"
                );
                HealthState::Failed
            }
        };
        if let Some(recorder) = metrics_recorder() {
            recorder.record_probe(name, latency, status);
        }
        ServiceStatus::new(name, status)
    }
}

impl std::fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn display_name(service: &ServiceEndpoint) -> &str {
    let name = service.name.trim();
    if name.is_empty() { UNKNOWN_SERVICE } else { name }
}
