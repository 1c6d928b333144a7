use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;

use crate::constants::*;
use crate::types::MarketState;

// ---------------------------------------------------------------------------
// Top-level aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalFusionConfig {
    pub app: AppConfig,
    pub indicators: IndicatorParams,
    pub market_context: MarketContextConfig,
    pub fusion: FusionConfig,
    pub gating: GatingConfig,
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How often the JSON log file rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub file_name: String,
    pub rotation: LogRotation,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Mirror events to stderr in compact form.
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: DEFAULT_LOG_DIR.into(),
            file_name: DEFAULT_LOG_FILE.into(),
            rotation: LogRotation::Daily,
            default_filter: DEFAULT_LOG_FILTER.into(),
            console: true,
        }
    }
}

// ---------------------------------------------------------------------------
// indicators.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ma_short: usize,
    pub ma_medium: usize,
    pub ma_long: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    /// Points required before `analyze` will run.
    pub min_history: usize,
    pub sr_min_order: usize,
    #[serde(with = "rust_decimal::serde::str")]
    pub sr_cluster_tolerance: Decimal,
    pub sr_max_levels: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_short: MA_SHORT_PERIOD,
            ma_medium: MA_MEDIUM_PERIOD,
            ma_long: MA_LONG_PERIOD,
            rsi_period: RSI_PERIOD,
            macd_fast: MACD_FAST,
            macd_slow: MACD_SLOW,
            macd_signal: MACD_SIGNAL,
            atr_period: ATR_PERIOD,
            min_history: MIN_ANALYSIS_HISTORY,
            sr_min_order: SR_MIN_ORDER,
            sr_cluster_tolerance: SR_CLUSTER_TOLERANCE,
            sr_max_levels: SR_MAX_LEVELS,
        }
    }
}

impl IndicatorParams {
    /// Smallest history `analyze` accepts under these parameters.
    pub fn required_history(&self) -> usize {
        self.min_history
            .max(self.macd_slow + self.macd_signal)
            .max(self.rsi_period + 1)
            .max(self.atr_period + 1)
            .max(self.ma_short)
    }
}

// ---------------------------------------------------------------------------
// market_context.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketContextConfig {
    pub cache_ttl_seconds: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub vix_low_threshold: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub vix_moderate_threshold: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub vix_high_threshold: Decimal,
    /// VIX used when the volatility history is missing.
    #[serde(with = "rust_decimal::serde::str")]
    pub vix_fallback: Decimal,
    /// Fixed volume-confirmation input to signal quality.
    #[serde(with = "rust_decimal::serde::str")]
    pub volume_confirmation_score: Decimal,
    pub ma_short: usize,
    pub ma_medium: usize,
}

impl Default for MarketContextConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: MARKET_CONTEXT_CACHE_TTL_SECONDS,
            vix_low_threshold: VIX_LOW_THRESHOLD,
            vix_moderate_threshold: VIX_MODERATE_THRESHOLD,
            vix_high_threshold: VIX_HIGH_THRESHOLD,
            vix_fallback: VIX_FALLBACK_VALUE,
            volume_confirmation_score: VOLUME_CONFIRMATION_PLACEHOLDER,
            ma_short: MA_SHORT_PERIOD,
            ma_medium: MA_MEDIUM_PERIOD,
        }
    }
}

// ---------------------------------------------------------------------------
// fusion.json
// ---------------------------------------------------------------------------

/// Raw (sentiment, technical, fundamental) weights as configured.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WeightTriple {
    #[serde(with = "rust_decimal::serde::str")]
    pub sentiment: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub technical: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub fundamental: Decimal,
}

impl WeightTriple {
    pub const fn new(sentiment: Decimal, technical: Decimal, fundamental: Decimal) -> Self {
        Self {
            sentiment,
            technical,
            fundamental,
        }
    }

    pub fn total(&self) -> Decimal {
        self.sentiment + self.technical + self.fundamental
    }
}

impl Default for WeightTriple {
    fn default() -> Self {
        Self::new(
            DEFAULT_SENTIMENT_WEIGHT,
            DEFAULT_TECHNICAL_WEIGHT,
            DEFAULT_FUNDAMENTAL_WEIGHT,
        )
    }
}

/// Default market-state weight table.
pub fn default_weight_table() -> HashMap<MarketState, WeightTriple> {
    HashMap::from([
        (MarketState::Bullish, WeightTriple::new(dec!(0.30), dec!(0.40), dec!(0.30))),
        (MarketState::Neutral, WeightTriple::new(dec!(0.25), dec!(0.35), dec!(0.40))),
        (MarketState::Bearish, WeightTriple::new(dec!(0.15), dec!(0.35), dec!(0.50))),
        (MarketState::Volatile, WeightTriple::new(dec!(0.15), dec!(0.35), dec!(0.50))),
    ])
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Used when no market context is available, or its state has no table entry.
    pub static_weights: WeightTriple,
    pub weight_table: HashMap<MarketState, WeightTriple>,
    #[serde(with = "rust_decimal::serde::str")]
    pub buy_threshold: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub sell_threshold: Decimal,
    pub trade_levels: TradeLevelConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            static_weights: WeightTriple::default(),
            weight_table: default_weight_table(),
            buy_threshold: BUY_THRESHOLD,
            sell_threshold: SELL_THRESHOLD,
            trade_levels: TradeLevelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradeLevelConfig {
    #[serde(with = "rust_decimal::serde::str")]
    pub risk_per_trade_percent: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_position_percent: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub min_risk_reward_ratio: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub atr_stop_multiplier: Decimal,
    /// Maximum stop distance below entry, as a fraction.
    #[serde(with = "rust_decimal::serde::str")]
    pub max_stop_distance: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub support_entry_buffer: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub support_stop_buffer: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub fallback_entry_discount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_entry_ratio: Decimal,
}

impl Default for TradeLevelConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_percent: RISK_PER_TRADE_PERCENT,
            max_position_percent: MAX_POSITION_PERCENT,
            min_risk_reward_ratio: MIN_RISK_REWARD_RATIO,
            atr_stop_multiplier: ATR_STOP_MULTIPLIER,
            max_stop_distance: MAX_STOP_DISTANCE,
            support_entry_buffer: SUPPORT_ENTRY_BUFFER,
            support_stop_buffer: SUPPORT_STOP_BUFFER,
            fallback_entry_discount: FALLBACK_ENTRY_DISCOUNT,
            max_entry_ratio: MAX_ENTRY_RATIO,
        }
    }
}

// ---------------------------------------------------------------------------
// gating.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatingConfig {
    pub no_trade: NoTradeConfig,
    pub reversal_watch: ReversalWatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NoTradeConfig {
    pub enabled: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub vix_spike_threshold: Decimal,
    /// Fractional drop of the broad index below its 50-period average.
    #[serde(with = "rust_decimal::serde::str")]
    pub nifty_drop_threshold: Decimal,
}

impl Default for NoTradeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vix_spike_threshold: NO_TRADE_VIX_SPIKE_THRESHOLD,
            nifty_drop_threshold: NO_TRADE_NIFTY_DROP_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReversalWatchConfig {
    #[serde(with = "rust_decimal::serde::str")]
    pub max_pe_ratio: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_pb_ratio: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_debt_to_equity: Decimal,
    /// Percent.
    #[serde(with = "rust_decimal::serde::str")]
    pub min_revenue_growth: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub panic_vix: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volatile_panic_vix: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub rsi_recovery: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume_spike_ratio: Decimal,
    pub volume_lookback: usize,
}

impl Default for ReversalWatchConfig {
    fn default() -> Self {
        Self {
            max_pe_ratio: REVERSAL_MAX_PE,
            max_pb_ratio: REVERSAL_MAX_PB,
            max_debt_to_equity: REVERSAL_MAX_DEBT_TO_EQUITY,
            min_revenue_growth: REVERSAL_MIN_REVENUE_GROWTH,
            panic_vix: REVERSAL_PANIC_VIX,
            volatile_panic_vix: REVERSAL_VOLATILE_PANIC_VIX,
            rsi_recovery: REVERSAL_RSI_RECOVERY,
            volume_spike_ratio: REVERSAL_VOLUME_SPIKE_RATIO,
            volume_lookback: REVERSAL_VOLUME_LOOKBACK,
        }
    }
}
