use crate::config::ServerConfig;
use crate::error::ServerResult;
use facegate::{Detector, HealthAggregator, ImageEncoder, ServiceEndpoint};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration, immutable after startup
    pub config: Arc<ServerConfig>,

    /// Probe targets derived once from the backend configuration
    pub services: Arc<Vec<ServiceEndpoint>>,

    pub encoder: ImageEncoder,

    pub detector: Detector,

    pub health: HealthAggregator,

    /// Prometheus render handle; `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// Create server state talking HTTP to the configured backends
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let detector = Detector::http(&config.backends)?;
        let health = HealthAggregator::http(&config.backends)?;
        Ok(Self::with_parts(config, detector, health))
    }

    /// Assemble state from pre-built collaborators
    pub fn with_parts(config: ServerConfig, detector: Detector, health: HealthAggregator) -> Self {
        Self {
            services: Arc::new(config.backends.services()),
            encoder: ImageEncoder::new(config.backends.max_image_bytes),
            config: Arc::new(config),
            detector,
            health,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Check if API key is valid
    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.config.api_keys.contains(key)
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
}
