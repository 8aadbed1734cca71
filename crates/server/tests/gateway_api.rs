//! End-to-end tests for the HTTP gateway: the router is driven in-process
//! with `oneshot` while the backends are real axum servers on loopback.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use server::config::ServerConfig;
use server::routes::detect::MISSING_FIELDS;
use server::{build_router, ServerState};

#[derive(Clone)]
struct MockBff {
    status: StatusCode,
    body: Value,
    received: Arc<Mutex<Vec<Value>>>,
}

impl MockBff {
    fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

async fn detect_handler(State(mock): State<MockBff>, Json(body): Json<Value>) -> impl IntoResponse {
    mock.received.lock().unwrap().push(body);
    (mock.status, Json(mock.body.clone()))
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_bff(mock: MockBff) -> String {
    spawn(
        Router::new()
            .route("/detect-faces", post(detect_handler))
            .route("/health", get(|| async { StatusCode::OK }))
            .with_state(mock),
    )
    .await
}

async fn spawn_health(status: StatusCode) -> String {
    spawn(Router::new().route("/health", get(move || async move { status }))).await
}

async fn spawn_hanging_health() -> String {
    spawn(Router::new().route(
        "/health",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::OK
        }),
    ))
    .await
}

async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn fake_png(len: usize) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(len, 0x42);
    bytes
}

fn test_config(bff_url: &str) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.metrics_enabled = false;
    config.backends.bff_url = bff_url.to_string();
    config.backends.detect_timeout_ms = 2_000;
    config.backends.probe_timeout_ms = 300;
    config
}

fn router(config: ServerConfig) -> Router {
    build_router(Arc::new(ServerState::new(config).expect("server state")))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn detect_returns_faces_in_requested_format() {
    let mock = MockBff::new(StatusCode::OK, json!({ "cropped_faces": ["Zm9v", "YmFy"] }));
    let app = router(test_config(&spawn_bff(mock.clone()).await));
    let image = STANDARD.encode(fake_png(2048));

    let response = app
        .oneshot(post_json(
            "/api/detect",
            json!({ "image": image, "target_format": "png" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "faces": ["Zm9v", "YmFy"], "fileType": "png" })
    );

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["image_base64"], json!(image));
    assert_eq!(calls[0]["target_format"], json!("png"));
}

#[tokio::test]
async fn data_url_prefix_is_stripped_before_dispatch() {
    let mock = MockBff::new(StatusCode::OK, json!({ "cropped_faces": [] }));
    let app = router(test_config(&spawn_bff(mock.clone()).await));
    let payload = STANDARD.encode(fake_png(64));

    let response = app
        .oneshot(post_json(
            "/api/detect",
            json!({ "image": format!("data:image/png;base64,{payload}"), "target_format": "JPG" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["faces"], json!([]));
    assert_eq!(body["fileType"], json!("jpeg"));
    assert_eq!(mock.calls()[0]["image_base64"], json!(payload));
}

#[tokio::test]
async fn missing_fields_are_rejected_without_backend_call() {
    let mock = MockBff::new(StatusCode::OK, json!({ "cropped_faces": [] }));
    let bff = spawn_bff(mock.clone()).await;
    let image = STANDARD.encode(fake_png(64));

    for body in [
        json!({ "image": image }),
        json!({ "target_format": "png" }),
        json!({ "image": "   ", "target_format": "png" }),
    ] {
        let response = router(test_config(&bff))
            .oneshot(post_json("/api/detect", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], json!("BAD_REQUEST"));
        assert_eq!(body["error"]["message"], json!(MISSING_FIELDS));
    }

    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn unsupported_format_is_rejected() {
    let mock = MockBff::new(StatusCode::OK, json!({ "cropped_faces": [] }));
    let app = router(test_config(&spawn_bff(mock.clone()).await));

    let response = app
        .oneshot(post_json(
            "/api/detect",
            json!({ "image": STANDARD.encode(fake_png(64)), "target_format": "svg" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn undecodable_image_is_invalid_input() {
    let mock = MockBff::new(StatusCode::OK, json!({ "cropped_faces": [] }));
    let app = router(test_config(&spawn_bff(mock.clone()).await));

    let response = app
        .oneshot(post_json(
            "/api/detect",
            json!({ "image": "definitely not base64!", "target_format": "png" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], json!("INVALID_INPUT"));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = router(test_config(&dead_url().await));

    let request = Request::builder()
        .method("POST")
        .uri("/api/detect")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn backend_error_status_is_mirrored() {
    for status in [StatusCode::INTERNAL_SERVER_ERROR, StatusCode::SERVICE_UNAVAILABLE] {
        let mock = MockBff::new(status, json!({ "detail": "model not loaded" }));
        let app = router(test_config(&spawn_bff(mock.clone()).await));

        let response = app
            .oneshot(post_json(
                "/api/detect",
                json!({ "image": STANDARD.encode(fake_png(128)), "target_format": "webp" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), status);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], json!("BACKEND_ERROR"));
        assert_eq!(body["error"]["upstream_status"], json!(status.as_u16()));
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("model not loaded"));
        assert_eq!(mock.calls().len(), 1);
    }
}

#[tokio::test]
async fn unreachable_backend_is_transport_failure() {
    let app = router(test_config(&dead_url().await));

    let response = app
        .oneshot(post_json(
            "/api/detect",
            json!({ "image": STANDARD.encode(fake_png(128)), "target_format": "png" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], json!("TRANSPORT_FAILURE"));
    assert!(body["error"].get("upstream_status").is_none());
}

#[tokio::test]
async fn services_health_reports_each_backend_in_order() {
    let mut config = test_config(&spawn_health(StatusCode::OK).await);
    config.backends.file_converter_url = spawn_health(StatusCode::INTERNAL_SERVER_ERROR).await;
    config.backends.face_recognition_url = spawn_hanging_health().await;

    let response = router(config).oneshot(get_req("/api/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
    let body = json_body(response).await;
    assert_eq!(
        body["services"],
        json!([
            { "name": "BFF Service", "status": "Healthy" },
            { "name": "File Convertor Service", "status": "Failed" },
            { "name": "Face Recognition Service", "status": "Failed" },
        ])
    );
}

#[tokio::test]
async fn api_routes_require_key_when_configured() {
    let mock = MockBff::new(StatusCode::OK, json!({ "cropped_faces": ["Zm9v"] }));
    let mut config = test_config(&spawn_bff(mock.clone()).await);
    config.api_keys.insert("test-api-key".to_string());
    let app = router(config);
    let body = json!({ "image": STANDARD.encode(fake_png(64)), "target_format": "png" });

    let response = app
        .clone()
        .oneshot(post_json("/api/detect", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json("/api/detect", body.clone());
    request
        .headers_mut()
        .insert("x-api-key", "wrong".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json("/api/detect", body);
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer test-api-key".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Liveness stays public
    let response = app.oneshot(get_req("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.calls().len(), 1);
}

#[tokio::test]
async fn public_endpoints() {
    let app = router(test_config(&dead_url().await));

    let response = app.clone().oneshot(get_req("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], json!("healthy"));

    let response = app.clone().oneshot(get_req("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["target_formats"],
        json!(["jpeg", "png", "webp"])
    );

    // Metrics disabled in tests
    let response = app.clone().oneshot(get_req("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get_req("/no/such/route")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], json!("NOT_FOUND"));
}

#[tokio::test]
async fn metrics_endpoint_renders_when_enabled() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let state = ServerState::new(test_config(&dead_url().await))
        .expect("server state")
        .with_metrics(recorder.handle());
    let app = build_router(Arc::new(state));

    let response = app.oneshot(get_req("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = router(test_config(&dead_url().await));

    let mut request = get_req("/health");
    request
        .headers_mut()
        .insert("x-request-id", "req-42".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-42");

    let response = app.oneshot(get_req("/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
