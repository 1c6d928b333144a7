pub mod types;
pub mod validate;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Load and merge all config JSON files into a single [`SignalFusionConfig`],
/// then apply environment variable overrides and validate.
///
/// Expected directory layout:
/// ```text
/// config/
///   app.json
///   indicators.json
///   market_context.json
///   fusion.json
///   gating.json
/// ```
///
/// # Environment variable overrides
///
/// | Env Var                            | Config Field                          |
/// |------------------------------------|---------------------------------------|
/// | `SIGNAL_FUSION_LOG_DIR`            | `app.logging.log_dir`                 |
/// | `NO_TRADE_ENABLED`                 | `gating.no_trade.enabled`             |
/// | `NO_TRADE_VIX_SPIKE_THRESHOLD`     | `gating.no_trade.vix_spike_threshold` |
/// | `NO_TRADE_NIFTY_DROP_THRESHOLD`    | `gating.no_trade.nifty_drop_threshold`|
/// | `MARKET_CONTEXT_CACHE_TTL_SECONDS` | `market_context.cache_ttl_seconds`    |
/// | `FUSION_SENTIMENT_WEIGHT`          | `fusion.static_weights.sentiment`     |
/// | `FUSION_TECHNICAL_WEIGHT`          | `fusion.static_weights.technical`     |
/// | `FUSION_FUNDAMENTAL_WEIGHT`        | `fusion.static_weights.fundamental`   |
pub fn load_config(config_dir: &Path) -> Result<SignalFusionConfig> {
    let (config, overrides) = load_config_with_overrides(config_dir)?;
    log_env_overrides(&overrides);
    Ok(config)
}

/// Same as [`load_config`], but returns the applied env overrides instead of
/// logging them. For callers that install the tracing subscriber from the
/// loaded config and so can only log once it is up.
pub fn load_config_with_overrides(
    config_dir: &Path,
) -> Result<(SignalFusionConfig, Vec<EnvOverride>)> {
    let read = |name: &str| -> Result<String> {
        let path = config_dir.join(name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))
    };

    let app: AppConfig = serde_json::from_str(&read("app.json")?).context("parsing app.json")?;

    let indicators: IndicatorParams =
        serde_json::from_str(&read("indicators.json")?).context("parsing indicators.json")?;

    let market_context: MarketContextConfig = serde_json::from_str(&read("market_context.json")?)
        .context("parsing market_context.json")?;

    let fusion: FusionConfig =
        serde_json::from_str(&read("fusion.json")?).context("parsing fusion.json")?;

    let gating: GatingConfig =
        serde_json::from_str(&read("gating.json")?).context("parsing gating.json")?;

    let mut config = SignalFusionConfig {
        app,
        indicators,
        market_context,
        fusion,
        gating,
    };

    let overrides = apply_env_overrides(&mut config);
    validate::validate_config(&config)?;

    Ok((config, overrides))
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// One env var that replaced a JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOverride {
    pub key: &'static str,
    pub value: String,
}

impl EnvOverride {
    fn new(key: &'static str, value: impl ToString) -> Self {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

pub fn log_env_overrides(overrides: &[EnvOverride]) {
    for o in overrides {
        info!(key = o.key, value = %o.value, "env override applied");
    }
}

/// Apply environment variable overrides to the loaded config.
///
/// Only non-empty env vars take effect. Parse failures are skipped and the
/// JSON value remains.
fn apply_env_overrides(config: &mut SignalFusionConfig) -> Vec<EnvOverride> {
    let mut applied = Vec::new();

    // -- Logging -------------------------------------------------------------
    if let Some(val) = env_string("SIGNAL_FUSION_LOG_DIR") {
        applied.push(EnvOverride::new("SIGNAL_FUSION_LOG_DIR", &val));
        config.app.logging.log_dir = val;
    }

    // -- No-trade gate -------------------------------------------------------
    if let Some(val) = env_bool("NO_TRADE_ENABLED") {
        applied.push(EnvOverride::new("NO_TRADE_ENABLED", val));
        config.gating.no_trade.enabled = val;
    }

    if let Some(val) = env_decimal("NO_TRADE_VIX_SPIKE_THRESHOLD") {
        applied.push(EnvOverride::new("NO_TRADE_VIX_SPIKE_THRESHOLD", val));
        config.gating.no_trade.vix_spike_threshold = val;
    }

    if let Some(val) = env_decimal("NO_TRADE_NIFTY_DROP_THRESHOLD") {
        applied.push(EnvOverride::new("NO_TRADE_NIFTY_DROP_THRESHOLD", val));
        config.gating.no_trade.nifty_drop_threshold = val;
    }

    // -- Market context ------------------------------------------------------
    if let Some(val) = env_parse::<u64>("MARKET_CONTEXT_CACHE_TTL_SECONDS") {
        applied.push(EnvOverride::new("MARKET_CONTEXT_CACHE_TTL_SECONDS", val));
        config.market_context.cache_ttl_seconds = val;
    }

    // -- Fusion weights ------------------------------------------------------
    if let Some(val) = env_decimal("FUSION_SENTIMENT_WEIGHT") {
        applied.push(EnvOverride::new("FUSION_SENTIMENT_WEIGHT", val));
        config.fusion.static_weights.sentiment = val;
    }

    if let Some(val) = env_decimal("FUSION_TECHNICAL_WEIGHT") {
        applied.push(EnvOverride::new("FUSION_TECHNICAL_WEIGHT", val));
        config.fusion.static_weights.technical = val;
    }

    if let Some(val) = env_decimal("FUSION_FUNDAMENTAL_WEIGHT") {
        applied.push(EnvOverride::new("FUSION_FUNDAMENTAL_WEIGHT", val));
        config.fusion.static_weights.fundamental = val;
    }

    applied
}

/// Read a non-empty env var as a `String`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a non-empty env var as a bool (`true`, `1`, `yes` → true).
fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

/// Read a non-empty env var and parse it as `T`.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

/// Read a non-empty env var and parse it as `Decimal`.
fn env_decimal(key: &str) -> Option<Decimal> {
    env_string(key).and_then(|v| Decimal::from_str(&v).ok())
}
