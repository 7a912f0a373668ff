//! # Coedit Server
//!
//! Realtime document session coordinator.
//!
//! ## Usage
//!
//! ```bash
//! # Run with a signing secret and default settings
//! COEDIT_JWT_SECRET=change-me coedit
//!
//! # Run with a config file
//! COEDIT_CONFIG=/path/to/coedit.toml coedit
//!
//! # Run with environment variables
//! COEDIT_PORT=8080 COEDIT_HOST=0.0.0.0 coedit
//! ```

use anyhow::Result;
use coedit_server::{config::Config, metrics, run_server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up COEDIT_* from a local .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coedit=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;

    tracing::info!("Starting Coedit server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    run_server(config).await?;

    Ok(())
}
