//! Walk through the Facegate Server API
//!
//! ```text
//! cargo run -p facegate-server --example api_client -- path/to/photo.jpg [png]
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};

const SERVER_URL: &str = "http://localhost:8080";
const API_KEY: &str = "demo-key-12345";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let image_path = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: api_client <image> [jpeg|png|webp]"))?;
    let target_format = args.next().unwrap_or_else(|| "jpeg".to_string());

    let client = Client::new();

    // Example 1: Gateway liveness
    println!("1. Health Check:");
    let resp = client.get(format!("{SERVER_URL}/health")).send().await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 2: Backend services
    println!("2. Backend Services:");
    let resp = client
        .get(format!("{SERVER_URL}/api/health"))
        .header("X-API-Key", API_KEY)
        .send()
        .await?;
    println!("Status: {}", resp.status());
    let body: Value = resp.json().await?;
    if let Some(services) = body["services"].as_array() {
        for service in services {
            println!("  {:<28} {}", service["name"], service["status"]);
        }
    }
    println!();

    // Example 3: Face detection
    println!("3. Detect Faces in {image_path}:");
    let bytes = tokio::fs::read(&image_path).await?;
    let resp = client
        .post(format!("{SERVER_URL}/api/detect"))
        .header("X-API-Key", API_KEY)
        .json(&json!({
            "image": STANDARD.encode(&bytes),
            "target_format": target_format,
        }))
        .send()
        .await?;
    let status = resp.status();
    let body: Value = resp.json().await?;
    println!("Status: {status}");
    match body["faces"].as_array() {
        Some(faces) => println!("Faces: {} ({})", faces.len(), body["fileType"]),
        None => println!("Error: {}", body["error"]),
    }

    Ok(())
}
