//! Orchestration core for a remote face-detection pipeline.
//!
//! The crate does no pixel work of its own. It shapes requests for the
//! detection backend, normalizes whatever comes back into a stable
//! [`DetectionResult`], and watches the liveness of the backends behind it.
//!
//! ## Pieces
//!
//! - [`ImageEncoder`] turns an uploaded file into an [`EncodedImage`].
//! - [`Detector`] sends one image to the detection backend and returns either
//!   a [`DetectionResult`] or an [`OrchestrationError`]. Single attempt, no
//!   retry.
//! - [`HealthAggregator`] probes every configured service concurrently and
//!   returns one [`ServiceStatus`] per service, in configuration order.
//! - [`DetectionSession`] is the upload → preview → submit → result state
//!   machine that keeps one submission in flight at a time.
//!
//! ## Example
//!
//! ```no_run
//! use facegate::{BackendConfig, Detector, HealthAggregator, ImageEncoder, TargetFormat};
//!
//! # async fn run(png: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = BackendConfig::from_env();
//! cfg.validate()?;
//!
//! let image = ImageEncoder::new(cfg.max_image_bytes).encode(&png, "image/png")?;
//! let detector = Detector::http(&cfg)?;
//! match detector.detect(&image, TargetFormat::Png).await {
//!     Ok(result) => println!("{} faces", result.face_count()),
//!     Err(err) => eprintln!("detection failed: {err}"),
//! }
//!
//! let statuses = HealthAggregator::http(&cfg)?.check_all(&cfg.services()).await;
//! for status in statuses {
//!     println!("{}: {:?}", status.name, status.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detect;
pub mod encoder;
pub mod error;
pub mod health;
pub mod session;
pub mod types;

pub use crate::config::BackendConfig;
pub use crate::detect::{DetectionBackend, Detector, HttpDetectionBackend};
pub use crate::encoder::{ImageEncoder, UNKNOWN_IMAGE_TYPE, sniff_media_type};
pub use crate::error::{ConfigError, EncodeError, OrchestrationError};
pub use crate::health::{HealthAggregator, HealthProbe, HttpProbe, ProbeError, UNKNOWN_SERVICE};
pub use crate::session::{DetectionSession, SessionError, SessionState};
pub use crate::types::{
    DetectFacesResponse, DetectionRequest, DetectionResult, EncodedImage, HealthState,
    ServiceEndpoint, ServiceStatus, TargetFormat, UnsupportedFormat,
};

use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

/// Observer for outbound calls. Purely a side channel: recorders must not
/// block and cannot influence the outcome of a call.
pub trait OrchestrationMetrics: Send + Sync {
    fn record_detect(&self, latency: Duration, result: Result<usize, &OrchestrationError>);
    fn record_probe(&self, service: &str, latency: Duration, status: HealthState);
}

/// Install or clear the global orchestration metrics recorder.
pub fn set_orchestration_metrics(recorder: Option<Arc<dyn OrchestrationMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn OrchestrationMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn OrchestrationMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn OrchestrationMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}
