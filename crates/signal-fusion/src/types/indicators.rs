use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Price/momentum regime produced by the indicator engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Regime {
    /// Price above rising averages with positive MACD.
    BullishTrend,
    /// Price below falling averages with negative MACD.
    BearishTrend,
    /// RSI < 25, negative MACD, price under the 20-period average.
    OversoldZone,
    /// RSI > 75, positive MACD, price over the 20-period average.
    OverboughtZone,
    /// No directional agreement between price, averages and MACD.
    Consolidation,
    Neutral,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BullishTrend => "bullish-trend",
            Self::BearishTrend => "bearish-trend",
            Self::OversoldZone => "oversold-zone",
            Self::OverboughtZone => "overbought-zone",
            Self::Consolidation => "consolidation",
            Self::Neutral => "neutral",
        }
    }

    pub fn is_trend(&self) -> bool {
        matches!(self, Self::BullishTrend | Self::BearishTrend)
    }

    /// Oversold and overbought zones: momentum is stretched and may revert.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::OversoldZone | Self::OverboughtZone)
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional bias, shared by technical output and index trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full indicator output for one instrument's price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    /// Last close of the analysed history.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ma20: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ma50: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ma200: Decimal,
    /// RSI in [0, 100].
    #[serde(with = "rust_decimal::serde::str")]
    pub rsi: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub macd: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub macd_signal: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub atr: Decimal,
    /// Ascending, at most five levels.
    pub support_levels: Vec<Decimal>,
    /// Ascending, at most five levels.
    pub resistance_levels: Vec<Decimal>,
    /// Composite score in [-1, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub technical_score: Decimal,
    pub regime: Regime,
    pub direction: Direction,
    /// Strength in [0, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub strength: Decimal,
    /// Confidence in [0, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub confidence: Decimal,
}

impl IndicatorSet {
    pub fn macd_histogram(&self) -> Decimal {
        self.macd - self.macd_signal
    }

    /// Highest support strictly below `price`.
    pub fn nearest_support_below(&self, price: Decimal) -> Option<Decimal> {
        self.support_levels
            .iter()
            .copied()
            .filter(|s| *s < price)
            .max()
    }

    /// Lowest resistance strictly above `price`.
    pub fn nearest_resistance_above(&self, price: Decimal) -> Option<Decimal> {
        self.resistance_levels
            .iter()
            .copied()
            .filter(|r| *r > price)
            .min()
    }
}
