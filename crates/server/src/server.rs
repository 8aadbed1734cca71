//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration with all endpoints
//! - Middleware stack (auth, logging, compression, etc.)
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{api_key_auth, request_context};
use crate::routes::{api_info, not_found};
use crate::routes::{detect, health};
use crate::state::ServerState;
use crate::telemetry::{install_recorder, PrometheusMetrics};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Routes are divided into:
/// - Public routes: /, /health, /metrics
/// - API routes: /api/detect, /api/health (API key required when keys are configured)
///
/// Middleware, outermost first:
/// 1. Request tracing
/// 2. Request context (id, span, completion log)
/// 3. CORS
/// 4. Compression
/// 5. Timeout handling
/// 6. API key authentication (API routes only)
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics));

    // API routes
    let api_routes = Router::new()
        .route("/api/detect", post(detect::detect_faces))
        .route("/api/health", get(health::services_health))
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(from_fn_with_state(state.clone(), api_key_auth));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(request_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Facegate HTTP gateway
///
/// Blocks until the server is shut down via SIGTERM or Ctrl+C.
///
/// # Initialization
///
/// 1. Sets up structured JSON logging with the configured log level
/// 2. Installs the Prometheus recorder and the core metrics hook (if enabled)
/// 3. Creates shared server state (encoder, detector, health aggregator)
/// 4. Builds the Axum router with all routes and middleware
/// 5. Binds to the configured TCP address and serves with graceful shutdown
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .init();

    health::mark_started();

    let mut state = ServerState::new(config.clone())?;
    if config.metrics_enabled {
        let handle = install_recorder()?;
        facegate::set_orchestration_metrics(Some(Arc::new(PrometheusMetrics)));
        state = state.with_metrics(handle);
    }

    let app = build_router(Arc::new(state));
    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!("Starting Facegate server on {}", addr);
    tracing::info!(
        "Detection backend: {} (timeout {}ms)",
        config.backends.detect_endpoint(),
        config.backends.detect_timeout_ms
    );
    for service in config.backends.services() {
        tracing::info!(
            "Health probe: {} -> {} (timeout {}ms)",
            service.name,
            service.probe_url,
            config.backends.probe_timeout_ms
        );
    }
    tracing::info!(
        "Timeout: {}s, Max body: {}MB, Max image: {} bytes",
        config.timeout_secs,
        config.max_body_size_mb,
        config.backends.max_image_bytes
    );
    tracing::info!(
        "CORS: {}, Metrics: {}, Auth: {}",
        config.enable_cors,
        config.metrics_enabled,
        config.auth_enabled()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
