//! Facegate gateway binary.
//!
//! Serves the detection and backend-health endpoints in front of the face
//! detection backend.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    server::start_server(config).await?;
    Ok(())
}
