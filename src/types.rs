//! Data types shared by the encoder, the orchestrator and the aggregator.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::EncodeError;

/// A user-supplied image, ready for transport.
///
/// Both fields are validated on construction: `media_type` is always
/// `image/<subtype>` in lowercase and `payload` is standard base64 that
/// decodes to at least one byte. Instances are immutable; a new selection
/// produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedImage {
    media_type: String,
    payload: String,
}

impl EncodedImage {
    /// Build from an already-encoded payload and its declared media type.
    pub fn from_base64(
        media_type: &str,
        payload: impl Into<String>,
    ) -> Result<Self, EncodeError> {
        let media_type = normalize_media_type(media_type)?;
        let payload = payload.into();
        let decoded = STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| EncodeError::InvalidBase64(e.to_string()))?;
        if decoded.is_empty() {
            return Err(EncodeError::Empty);
        }
        Ok(Self {
            media_type,
            payload,
        })
    }

    /// Parse a `data:image/<subtype>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, EncodeError> {
        let (media_type, payload) = split_data_url(url).ok_or_else(|| {
            EncodeError::NotAnImage("not a base64 image data URL".to_string())
        })?;
        Self::from_base64(media_type, payload)
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decode the payload back into raw bytes.
    pub fn decode(&self) -> Vec<u8> {
        // Validated at construction.
        STANDARD.decode(self.payload.as_bytes()).unwrap_or_default()
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.payload)
    }
}

/// Splits a base64 data URL into `(media_type, payload)`. Only `image/*`
/// URLs are recognised.
pub(crate) fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let media_type = header.strip_suffix(";base64")?;
    if !is_image_media_type(media_type) {
        return None;
    }
    Some((media_type, payload))
}

/// `image/<subtype>` where subtype is `[A-Za-z0-9.+-]+`.
pub(crate) fn is_image_media_type(value: &str) -> bool {
    let Some((kind, subtype)) = value.split_once('/') else {
        return false;
    };
    kind.eq_ignore_ascii_case("image")
        && !subtype.is_empty()
        && subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'))
}

/// Strips parameters (`; charset=...`), trims and lowercases. Rejects
/// anything that is not an image type.
pub(crate) fn normalize_media_type(declared: &str) -> Result<String, EncodeError> {
    let essence = declared.split(';').next().unwrap_or_default().trim();
    if is_image_media_type(essence) {
        Ok(essence.to_ascii_lowercase())
    } else {
        Err(EncodeError::NotAnImage(declared.to_string()))
    }
}

/// Output format requested for the cropped faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl TargetFormat {
    /// Every format the detection backend can produce.
    pub const ALL: [TargetFormat; 3] = [TargetFormat::Jpeg, TargetFormat::Png, TargetFormat::Webp];

    pub fn as_str(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Png => "image/png",
            TargetFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a format string names nothing the backend produces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported target format '{0}' (expected one of: jpeg, png, webp)")]
pub struct UnsupportedFormat(pub String);

impl FromStr for TargetFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            "png" => Ok(TargetFormat::Png),
            "webp" => Ok(TargetFormat::Webp),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}

/// Wire body for `POST <backend>/detect-faces`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub image_base64: String,
    pub target_format: TargetFormat,
}

impl DetectionRequest {
    pub fn new(image: &EncodedImage, target_format: TargetFormat) -> Self {
        Self {
            image_base64: image.payload().to_string(),
            target_format,
        }
    }
}

/// Success body returned by the detection backend. `cropped_faces` may be
/// absent or `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DetectFacesResponse {
    #[serde(default)]
    pub cropped_faces: Option<Vec<String>>,
}

/// Normalized outcome of one detection submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Base64-encoded face crops in backend order.
    pub faces: Vec<String>,
    /// Always the format that was requested.
    pub file_type: TargetFormat,
}

impl DetectionResult {
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Faces as `data:image/<fileType>;base64,...` URLs, ready for display.
    pub fn face_data_urls(&self) -> Vec<String> {
        self.faces
            .iter()
            .map(|face| format!("data:{};base64,{face}", self.file_type.media_type()))
            .collect()
    }
}

/// Tri-state liveness of one backend service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    Healthy,
    Loading,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub status: HealthState,
}

impl ServiceStatus {
    pub fn new(name: impl Into<String>, status: HealthState) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

/// A named probe target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub probe_url: String,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, probe_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probe_url: probe_url.into(),
        }
    }
}
