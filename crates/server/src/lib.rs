//! Facegate Server - HTTP gateway for the face detection pipeline
//!
//! Accepts images from the browser, hands them to the detection backend
//! through the `facegate` orchestration core and reports the liveness of
//! every backend service.
//!
//! # Features
//!
//! - **Detection**: validates `{image, target_format}` at the boundary and
//!   forwards one request per submission, never retrying
//! - **Health**: concurrent, uncached probes of all configured backends
//! - **Middleware**: compression, CORS, request ID tracking, structured logging
//! - **Configuration**: `.env`, optional `server.*` file, `FACEGATE__*` variables
//! - **Metrics**: Prometheus exposition of detection and probe outcomes
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /` - API information
//! - `GET /health` - Gateway liveness
//! - `GET /metrics` - Prometheus metrics
//! - `POST /api/detect` - Detect faces in an image
//! - `GET /api/health` - Status of every backend service

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
