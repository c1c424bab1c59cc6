//! Interview Proctoring Server - Main Entry Point
//!
//! Usage: `proctor-server [config-file]`

use api::{init_logging, run_server, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = ServerConfig::load(config_path.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== Interview Proctoring v{} ===", env!("CARGO_PKG_VERSION"));
    match &config.model.model_path {
        Some(path) => info!("Face mesh model: {}", path),
        None => info!("No face mesh model configured, using static landmarks"),
    }

    run_server(config).await?;

    Ok(())
}
