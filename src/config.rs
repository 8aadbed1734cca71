//! Backend topology and timeouts.
//!
//! A [`BackendConfig`] is built once at startup, validated, then shared
//! read-only (usually behind an `Arc`) with the orchestrator and the health
//! aggregator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ServiceEndpoint;

pub const BFF_SERVICE: &str = "BFF Service";
pub const FILE_CONVERTER_SERVICE: &str = "File Convertor Service";
pub const FACE_RECOGNITION_SERVICE: &str = "Face Recognition Service";

/// Upper bound accepted for `max_image_bytes`.
pub const MAX_IMAGE_BYTES_CEILING: usize = 256 * 1024 * 1024;

/// Base URLs of the three backends plus call limits.
///
/// # Example
/// ```
/// use facegate::BackendConfig;
///
/// let cfg = BackendConfig {
///     bff_url: "http://bff.internal:8001".into(),
///     ..Default::default()
/// };
/// cfg.validate().unwrap();
/// assert_eq!(cfg.detect_endpoint(), "http://bff.internal:8001/detect-faces");
/// assert_eq!(cfg.services().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Detection backend (BFF) base URL.
    #[serde(default = "default_bff_url")]
    pub bff_url: String,

    #[serde(default = "default_file_converter_url")]
    pub file_converter_url: String,

    #[serde(default = "default_face_recognition_url")]
    pub face_recognition_url: String,

    /// Upper bound for the detection call, in milliseconds.
    #[serde(default = "default_detect_timeout_ms")]
    pub detect_timeout_ms: u64,

    /// Upper bound for each health probe, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Largest raw image the encoder accepts.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            bff_url: default_bff_url(),
            file_converter_url: default_file_converter_url(),
            face_recognition_url: default_face_recognition_url(),
            detect_timeout_ms: default_detect_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

impl BackendConfig {
    /// Defaults overlaid with `BFF_URL`, `FILE_CONVERTER_URL` and
    /// `FACE_RECOGNITION_URL` from the environment.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    /// Overlay the backend URL environment variables onto `self`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty("BFF_URL") {
            self.bff_url = url;
        }
        if let Some(url) = non_empty("FILE_CONVERTER_URL") {
            self.file_converter_url = url;
        }
        if let Some(url) = non_empty("FACE_RECOGNITION_URL") {
            self.face_recognition_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            (BFF_SERVICE, &self.bff_url),
            (FILE_CONVERTER_SERVICE, &self.file_converter_url),
            (FACE_RECOGNITION_SERVICE, &self.face_recognition_url),
        ] {
            reqwest::Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        }
        if self.detect_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("detection"));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("health probe"));
        }
        if self.max_image_bytes == 0 || self.max_image_bytes > MAX_IMAGE_BYTES_CEILING {
            return Err(ConfigError::ImageLimit {
                value: self.max_image_bytes,
                max: MAX_IMAGE_BYTES_CEILING,
            });
        }
        Ok(())
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn detect_endpoint(&self) -> String {
        join_path(&self.bff_url, "detect-faces")
    }

    /// Probe targets in display order.
    pub fn services(&self) -> Vec<ServiceEndpoint> {
        vec![
            ServiceEndpoint::new(BFF_SERVICE, join_path(&self.bff_url, "health")),
            ServiceEndpoint::new(
                FILE_CONVERTER_SERVICE,
                join_path(&self.file_converter_url, "health"),
            ),
            ServiceEndpoint::new(
                FACE_RECOGNITION_SERVICE,
                join_path(&self.face_recognition_url, "health"),
            ),
        ]
    }
}

fn join_path(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}

fn default_bff_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_file_converter_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_face_recognition_url() -> String {
    "http://localhost:8002".to_string()
}

fn default_detect_timeout_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}
