//! Detection orchestrator against a live (mock) detection backend.

mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use facegate::{
    BackendConfig, Detector, ImageEncoder, OrchestrationError, TargetFormat,
};
use serde_json::{Value, json};

use common::{dead_url, fake_png, spawn_server};

/// Canned reply plus a log of every body the backend received.
#[derive(Clone)]
struct MockBackend {
    status: StatusCode,
    body: String,
    delay: Duration,
    received: Arc<Mutex<Vec<Value>>>,
}

impl MockBackend {
    fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    async fn start(&self) -> String {
        let app = Router::new()
            .route("/detect-faces", post(detect_faces))
            .with_state(self.clone());
        spawn_server(app).await
    }
}

async fn detect_faces(
    State(mock): State<MockBackend>,
    Json(body): Json<Value>,
) -> (StatusCode, [(&'static str, &'static str); 1], String) {
    mock.received.lock().unwrap().push(body);
    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }
    (
        mock.status,
        [("content-type", "application/json")],
        mock.body.clone(),
    )
}

fn detector_for(base: &str, timeout_ms: u64) -> Detector {
    let cfg = BackendConfig {
        bff_url: base.to_string(),
        detect_timeout_ms: timeout_ms,
        ..Default::default()
    };
    Detector::http(&cfg).expect("detector builds")
}

#[tokio::test]
async fn png_submission_returns_faces_in_requested_format() {
    let backend = MockBackend::new(StatusCode::OK, r#"{"cropped_faces": ["Zm9v", "YmFy"]}"#);
    let base = backend.start().await;

    let png = fake_png(2048);
    let image = ImageEncoder::new(10 * 1024 * 1024)
        .encode(&png, "image/png")
        .unwrap();
    let result = detector_for(&base, 5_000)
        .detect(&image, TargetFormat::Png)
        .await
        .unwrap();

    assert_eq!(result.faces, vec!["Zm9v", "YmFy"]);
    assert_eq!(result.file_type, TargetFormat::Png);
    assert_eq!(backend.calls(), 1);

    let received = backend.received.lock().unwrap();
    assert_eq!(received[0]["target_format"], "png");
    assert_eq!(received[0]["image_base64"], image.payload());
}

#[tokio::test]
async fn file_type_ignores_what_backend_declares() {
    let backend = MockBackend::new(
        StatusCode::OK,
        r#"{"cropped_faces": ["Zm9v"], "file_type": "jpeg"}"#,
    );
    let base = backend.start().await;
    let image = ImageEncoder::new(4096).encode(&fake_png(64), "image/png").unwrap();

    let result = detector_for(&base, 5_000)
        .detect(&image, TargetFormat::Webp)
        .await
        .unwrap();
    assert_eq!(result.file_type, TargetFormat::Webp);
}

#[tokio::test]
async fn missing_cropped_faces_is_an_empty_list() {
    let backend = MockBackend::new(StatusCode::OK, r#"{"status": "ok"}"#);
    let base = backend.start().await;
    let image = ImageEncoder::new(4096).encode(&fake_png(64), "image/png").unwrap();

    let result = detector_for(&base, 5_000)
        .detect(&image, TargetFormat::Jpeg)
        .await
        .unwrap();
    assert!(result.faces.is_empty());
}

#[tokio::test]
async fn server_error_is_reported_once_with_status() {
    let backend = MockBackend::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"detail": "File converter service error: boom"}).to_string(),
    );
    let base = backend.start().await;
    let image = ImageEncoder::new(4096).encode(&fake_png(64), "image/png").unwrap();

    let err = detector_for(&base, 5_000)
        .detect(&image, TargetFormat::Png)
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), Some(500));
    assert_eq!(err.message(), "File converter service error: boom");
    assert_eq!(backend.calls(), 1, "no retry on failure");
}

#[tokio::test]
async fn non_json_success_body_is_transport_failure() {
    let backend = MockBackend::new(StatusCode::OK, "<html>gateway page</html>");
    let base = backend.start().await;
    let image = ImageEncoder::new(4096).encode(&fake_png(64), "image/png").unwrap();

    let err = detector_for(&base, 5_000)
        .detect(&image, TargetFormat::Png)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestrationError::TransportFailure(_)));
    assert_eq!(err.http_status(), None);
}

#[tokio::test]
async fn wrongly_typed_faces_field_is_transport_failure() {
    let backend = MockBackend::new(StatusCode::OK, r#"{"cropped_faces": 3}"#);
    let base = backend.start().await;
    let image = ImageEncoder::new(4096).encode(&fake_png(64), "image/png").unwrap();

    let err = detector_for(&base, 5_000)
        .detect(&image, TargetFormat::Png)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestrationError::TransportFailure(_)));
}

#[tokio::test]
async fn unreachable_backend_is_transport_failure() {
    let base = dead_url().await;
    let image = ImageEncoder::new(4096).encode(&fake_png(64), "image/png").unwrap();

    let err = detector_for(&base, 2_000)
        .detect(&image, TargetFormat::Png)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestrationError::TransportFailure(_)));
    assert_eq!(err.http_status(), None);
}

#[tokio::test]
async fn slow_backend_is_abandoned_after_timeout() {
    let mut backend = MockBackend::new(StatusCode::OK, r#"{"cropped_faces": []}"#);
    backend.delay = Duration::from_secs(10);
    let base = backend.start().await;
    let image = ImageEncoder::new(4096).encode(&fake_png(64), "image/png").unwrap();

    let start = Instant::now();
    let err = detector_for(&base, 200)
        .detect(&image, TargetFormat::Png)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::TransportFailure(_)));
    assert!(start.elapsed() < Duration::from_secs(5));
}
