use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use signal_fusion::config;
use signal_fusion::core::pipeline::{AnalysisRequest, Pipeline};
use signal_fusion::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    let config_dir = std::env::var("SIGNAL_FUSION_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    // The subscriber is built from the config, so overrides are logged once it is up.
    let (config, overrides) = config::load_config_with_overrides(&config_dir)?;

    // Hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.app.logging)?;
    config::log_env_overrides(&overrides);

    info!(
        config_dir = %config_dir.display(),
        no_trade_enabled = config.gating.no_trade.enabled,
        cache_ttl_secs = config.market_context.cache_ttl_seconds,
        "signal fusion starting"
    );

    let request_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: signal-fusion <request.json>")?;

    let raw = std::fs::read_to_string(&request_path)
        .with_context(|| format!("failed to read request file: {}", request_path.display()))?;
    let request: AnalysisRequest = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", request_path.display()))?;

    info!(symbol = %request.symbol, bars = request.prices.len(), "request loaded");

    let pipeline = Pipeline::new(&config);
    let outcome = pipeline.evaluate(request).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("serializing outcome")?
    );

    Ok(())
}
