use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::indicators::Direction;
use super::market_data::PricePoint;

/// Volatility index bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VixLevel {
    /// VIX < 15.
    Low,
    /// 15 ≤ VIX < 20.
    Moderate,
    /// 20 ≤ VIX < 25.
    High,
    /// VIX ≥ 25.
    VeryHigh,
}

impl VixLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }

    /// High or very high: elevated enough to override index trends.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::High | Self::VeryHigh)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Low => "low (calm)",
            Self::Moderate => "moderate",
            Self::High => "high (elevated)",
            Self::VeryHigh => "very high (extreme)",
        }
    }
}

impl fmt::Display for VixLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall state of the broad market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketState {
    Bullish,
    Neutral,
    Bearish,
    /// Elevated VIX; overrides the index trends.
    Volatile,
}

impl MarketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Neutral => "neutral",
            Self::Bearish => "bearish",
            Self::Volatile => "volatile",
        }
    }
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of the broad market, shared by every consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub nifty_trend: Direction,
    pub bank_nifty_trend: Direction,
    pub vix_level: VixLevel,
    pub market_state: MarketState,
    #[serde(with = "rust_decimal::serde::str")]
    pub nifty_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub nifty_20dma: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub nifty_50dma: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub bank_nifty_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub bank_nifty_20dma: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub bank_nifty_50dma: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub vix_value: Decimal,
    /// How trustworthy the market read is, in [0, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub signal_quality: Decimal,
    /// How hospitable the market is to new long entries, in [0, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub favorability: Decimal,
    /// Unix seconds at computation time.
    pub timestamp: i64,
}

impl MarketContext {
    /// Broad index distance from its 50-period average as a signed fraction.
    /// `None` when the average is unavailable.
    pub fn nifty_vs_50dma(&self) -> Option<Decimal> {
        if self.nifty_50dma == Decimal::ZERO {
            return None;
        }
        Some((self.nifty_price - self.nifty_50dma) / self.nifty_50dma)
    }
}

/// Raw inputs for the market context provider.
///
/// A `None` (or empty) history stands for a failed fetch of that one series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketHistories {
    #[serde(default)]
    pub nifty: Option<Vec<PricePoint>>,
    #[serde(default)]
    pub bank_nifty: Option<Vec<PricePoint>>,
    #[serde(default)]
    pub vix: Option<Vec<PricePoint>>,
}
