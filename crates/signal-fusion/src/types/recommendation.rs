use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recommended trading action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment signal supplied by the upstream classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentInput {
    /// Score in [-1, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub score: Decimal,
    /// Classifier confidence in [0, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub confidence: Decimal,
    /// Number of independent articles/posts behind the score.
    pub source_count: usize,
}

/// Fundamentals record. Missing ratios are `None` and lower confidence
/// instead of failing the analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fundamentals {
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub pe_ratio: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub pb_ratio: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub debt_to_equity: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub eps: Option<Decimal>,
    /// Year-over-year revenue growth in percent.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub revenue_growth: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub industry_avg_pe: Option<Decimal>,
    /// Score in [-1, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub score: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub confidence: Decimal,
}

impl Fundamentals {
    /// How many of P/E, P/B and revenue growth are unknown.
    pub fn missing_core_metrics(&self) -> usize {
        [
            self.pe_ratio.is_none(),
            self.pb_ratio.is_none(),
            self.revenue_growth.is_none(),
        ]
        .iter()
        .filter(|missing| **missing)
        .count()
    }
}

/// Where a set of fusion weights came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeightSource {
    /// Configured weights, no market context.
    Static,
    DynamicBullish,
    DynamicNeutral,
    DynamicBearish,
    DynamicVolatile,
    /// Configured weights because the market state had no table entry.
    StaticFallback,
}

/// Per-signal fusion weights. The three weights always sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    #[serde(with = "rust_decimal::serde::str")]
    pub sentiment: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub technical: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub fundamental: Decimal,
    pub source: WeightSource,
}

impl FusionWeights {
    pub fn total(&self) -> Decimal {
        self.sentiment + self.technical + self.fundamental
    }
}

/// Decomposition of the fused confidence. Every field is in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    #[serde(with = "rust_decimal::serde::str")]
    pub sentiment_confidence: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub technical_confidence: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub fundamental_confidence: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub market_signal_quality: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub market_favorability: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub agreement_score: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub data_quality_penalty: Decimal,
}

/// Entry, stop and target for a long trade.
///
/// Invariant: `stop_loss < ideal_entry < target` and
/// `risk_reward_ratio >= 2.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    #[serde(with = "rust_decimal::serde::str")]
    pub ideal_entry: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_loss: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub target: Decimal,
    /// Capital at risk per trade, in percent.
    #[serde(with = "rust_decimal::serde::str")]
    pub risk_per_trade_percent: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub risk_reward_ratio: Decimal,
    /// Share of capital to allocate, in percent (0, 10].
    #[serde(with = "rust_decimal::serde::str")]
    pub position_size_percent: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
}

/// Fused recommendation for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    #[serde(with = "rust_decimal::serde::str")]
    pub confidence: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub combined_score: Decimal,
    /// Present for BUY.
    pub entry_range: Option<PriceRange>,
    /// Present for SELL.
    pub exit_range: Option<PriceRange>,
    pub reasoning: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub sentiment_contribution: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub technical_contribution: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub fundamental_contribution: Decimal,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub weights: FusionWeights,
    pub trade_levels: Option<TradeLevels>,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_action_wire_format() {
        assert_eq!(serde_json::to_string(&Action::Buy).unwrap(), "\"BUY\"");
        let a: Action = serde_json::from_str("\"HOLD\"").unwrap();
        assert_eq!(a, Action::Hold);
    }

    #[test]
    fn test_fundamentals_optional_ratios() {
        let f: Fundamentals =
            serde_json::from_str(r#"{ "pe_ratio": "18.5", "score": "0.2", "confidence": "0.7" }"#)
                .unwrap();
        assert_eq!(f.pe_ratio, Some(dec!(18.5)));
        assert!(f.pb_ratio.is_none());
        assert_eq!(f.missing_core_metrics(), 2);
    }

    #[test]
    fn test_weight_source_wire_format() {
        let json = serde_json::to_string(&WeightSource::StaticFallback).unwrap();
        assert_eq!(json, "\"static-fallback\"");
    }
}
