use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use facegate::{OrchestrationError, TargetFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MISSING_FIELDS: &str = "Missing required fields: image and target_format";

/// Inbound detection request.
///
/// Both fields are optional at the serde level so that a missing field
/// produces our own 400 message instead of a generic deserialization error.
#[derive(Debug, Default, Deserialize)]
pub struct DetectRequest {
    /// Base64 image, bare or as a `data:image/...;base64,` URL
    #[serde(default)]
    pub image: Option<String>,

    /// `jpeg`, `png` or `webp`
    #[serde(default)]
    pub target_format: Option<String>,
}

/// Successful detection response
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectResponse {
    pub success: bool,
    pub faces: Vec<String>,
    #[serde(rename = "fileType")]
    pub file_type: TargetFormat,
}

/// Forward an image to the detection backend.
///
/// # Example
/// ```json
/// // Request
/// { "image": "iVBORw0KGgo...", "target_format": "png" }
///
/// // Response
/// { "success": true, "faces": ["Zm9v", "YmFy"], "fileType": "png" }
/// ```
///
/// Missing fields, an unknown format or an undecodable image are rejected
/// with 400 before the backend is contacted. Backend failures mirror the
/// backend's status; transport failures answer 500.
pub async fn detect_faces(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<DetectRequest>, JsonRejection>,
) -> ServerResult<Json<DetectResponse>> {
    let Json(request) = body?;

    let (image, target_format) = match (non_blank(request.image), non_blank(request.target_format)) {
        (Some(image), Some(format)) => (image, format),
        _ => return Err(ServerError::BadRequest(MISSING_FIELDS.to_string())),
    };

    let target_format: TargetFormat = target_format
        .parse()
        .map_err(|e: facegate::UnsupportedFormat| ServerError::BadRequest(e.to_string()))?;

    let image = state
        .encoder
        .from_transport(&image)
        .map_err(OrchestrationError::from)?;

    let result = state.detector.detect(&image, target_format).await?;

    Ok(Json(DetectResponse {
        success: true,
        faces: result.faces,
        file_type: result.file_type,
    }))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
