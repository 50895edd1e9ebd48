//! AQI Gateway - Main Entry Point
//!
//! Usage: `aqi-gateway [config-file]`. The config file may also be given via
//! `AQI_CONFIG`; `AQI_*` environment variables override it.

use anyhow::Context;
use api::{init_logging, install_metrics, run_server, AppConfig, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("AQI_CONFIG").ok());

    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging).context("Failed to set tracing subscriber")?;

    info!("=== AQI Gateway v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Forwarding {} pollutant fields: {}",
        config.prediction.schema.len(),
        config.prediction.schema.fields().join(", ")
    );

    let metrics = install_metrics().context("Failed to install metrics recorder")?;
    let state = AppState::new(config)
        .context("Failed to build upstream clients")?
        .with_metrics(metrics);

    run_server(state).await.context("API server failed")?;

    Ok(())
}
