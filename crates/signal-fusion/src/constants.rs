use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Indicator Windows
// ---------------------------------------------------------------------------

pub const MA_SHORT_PERIOD: usize = 20;
pub const MA_MEDIUM_PERIOD: usize = 50;
pub const MA_LONG_PERIOD: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const ATR_PERIOD: usize = 14;

/// Price points required for a full `analyze` call.
pub const MIN_ANALYSIS_HISTORY: usize = 200;

/// Support/resistance needs at least this many points to look for extrema.
pub const SR_MIN_HISTORY: usize = 20;
/// Lower bound of the extrema look-around window (points on each side).
pub const SR_MIN_ORDER: usize = 5;
/// History length divisor for the adaptive look-around window.
pub const SR_ORDER_DIVISOR: usize = 20;
/// Levels within 2% of a cluster's running average merge into it.
pub const SR_CLUSTER_TOLERANCE: Decimal = dec!(0.02);
pub const SR_MAX_LEVELS: usize = 5;

// ---------------------------------------------------------------------------
// Regime Thresholds
// ---------------------------------------------------------------------------

pub const RSI_OVERSOLD_ZONE: Decimal = dec!(25);
pub const RSI_OVERBOUGHT_ZONE: Decimal = dec!(75);
pub const RSI_OVERSOLD: Decimal = dec!(30);
pub const RSI_OVERBOUGHT: Decimal = dec!(70);
pub const RSI_MIDLINE: Decimal = dec!(50);

// ---------------------------------------------------------------------------
// Technical Score Weights
// ---------------------------------------------------------------------------

pub const TECH_MA_WEIGHT: Decimal = dec!(0.3);
pub const TECH_RSI_WEIGHT: Decimal = dec!(0.3);
pub const TECH_MACD_WEIGHT: Decimal = dec!(0.4);
pub const MA_PAIR_SCORE: Decimal = dec!(0.33);
pub const MA_ALIGNMENT_SCORE: Decimal = dec!(0.34);
/// `tanh((macd - signal) / MACD_SCORE_SCALE)`.
pub const MACD_SCORE_SCALE: f64 = 2.0;

/// Scores beyond ±0.2 count as directional.
pub const DIRECTIONAL_BAND: Decimal = dec!(0.2);
pub const STRONG_SIGNAL: Decimal = dec!(0.6);

// ---------------------------------------------------------------------------
// Market Context
// ---------------------------------------------------------------------------

pub const VIX_LOW_THRESHOLD: Decimal = dec!(15);
pub const VIX_MODERATE_THRESHOLD: Decimal = dec!(20);
pub const VIX_HIGH_THRESHOLD: Decimal = dec!(25);
/// VIX assumed when the volatility index history is unavailable.
pub const VIX_FALLBACK_VALUE: Decimal = dec!(18.0);

/// Market context cache lifetime (15 minutes).
pub const MARKET_CONTEXT_CACHE_TTL_SECONDS: u64 = 900;

/// A 5% move away from both moving averages earns the full distance score.
pub const SIGNAL_QUALITY_FULL_DISTANCE: Decimal = dec!(0.05);
/// Volume confirmation placeholder; no volume comparison is performed.
pub const VOLUME_CONFIRMATION_PLACEHOLDER: Decimal = dec!(0.7);

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

pub const DEFAULT_SENTIMENT_WEIGHT: Decimal = dec!(0.5);
pub const DEFAULT_TECHNICAL_WEIGHT: Decimal = dec!(0.3);
pub const DEFAULT_FUNDAMENTAL_WEIGHT: Decimal = dec!(0.2);

pub const BUY_THRESHOLD: Decimal = dec!(0.3);
pub const SELL_THRESHOLD: Decimal = dec!(-0.3);

pub const VOLATILE_BUY_DOWNGRADE: Decimal = dec!(0.5);
pub const VOLATILE_SELL_DOWNGRADE: Decimal = dec!(-0.5);
pub const BEARISH_BUY_DOWNGRADE: Decimal = dec!(0.6);

pub const MAX_DATA_QUALITY_PENALTY: Decimal = dec!(0.3);
/// Population std-dev of the three scores above which signals conflict.
pub const CONFLICT_STD_DEV: f64 = 0.5;

/// Default ±2% band around the current price for entry/exit ranges.
pub const PRICE_BAND: Decimal = dec!(0.02);

// ---------------------------------------------------------------------------
// Trade Levels
// ---------------------------------------------------------------------------

pub const RISK_PER_TRADE_PERCENT: Decimal = dec!(1.5);
pub const MAX_POSITION_PERCENT: Decimal = dec!(10);
pub const MIN_RISK_REWARD_RATIO: Decimal = dec!(2.0);
pub const ATR_STOP_MULTIPLIER: Decimal = dec!(1.5);
/// Stops are never looser than 8% below entry.
pub const MAX_STOP_DISTANCE: Decimal = dec!(0.08);
pub const SUPPORT_ENTRY_BUFFER: Decimal = dec!(0.005);
pub const SUPPORT_STOP_BUFFER: Decimal = dec!(0.005);
pub const RESISTANCE_TARGET_BUFFER: Decimal = dec!(0.005);
pub const RESISTANCE_EXTENSION: Decimal = dec!(0.02);
pub const FALLBACK_ENTRY_DISCOUNT: Decimal = dec!(0.02);
pub const MAX_ENTRY_RATIO: Decimal = dec!(0.99);
/// Stop distance used when ATR is unavailable (zero).
pub const NO_ATR_STOP_DISTANCE: Decimal = dec!(0.05);

// ---------------------------------------------------------------------------
// No-Trade Gate
// ---------------------------------------------------------------------------

pub const NO_TRADE_VIX_SPIKE_THRESHOLD: Decimal = dec!(25.0);
pub const NO_TRADE_NIFTY_DROP_THRESHOLD: Decimal = dec!(0.03);
/// Volatile markets block entries only above this VIX.
pub const NO_TRADE_VOLATILE_VIX: Decimal = dec!(20);

// ---------------------------------------------------------------------------
// Reversal Watch
// ---------------------------------------------------------------------------

pub const REVERSAL_MAX_PE: Decimal = dec!(30);
pub const REVERSAL_MAX_PB: Decimal = dec!(5);
pub const REVERSAL_MAX_DEBT_TO_EQUITY: Decimal = dec!(2.0);
/// Revenue growth floor, in percent.
pub const REVERSAL_MIN_REVENUE_GROWTH: Decimal = dec!(-10);
pub const REVERSAL_PANIC_VIX: Decimal = dec!(30);
pub const REVERSAL_VOLATILE_PANIC_VIX: Decimal = dec!(25);
pub const REVERSAL_RSI_RECOVERY: Decimal = dec!(30);
pub const REVERSAL_VOLUME_SPIKE_RATIO: Decimal = dec!(1.5);
pub const REVERSAL_VOLUME_LOOKBACK: usize = 20;

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "signal-fusion.log";
pub const DEFAULT_LOG_FILTER: &str = "signal_fusion=info,warn";
