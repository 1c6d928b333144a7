//! Signal fusion: weighted combination of sentiment, technical and
//! fundamental scores into a single BUY/SELL/HOLD recommendation.
//!
//! Weights depend on the market state when a context is available. The
//! confidence is driven by how many signals agree with the fused direction,
//! blended with per-signal confidences and discounted for missing data.

use std::collections::HashMap;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::config::{FusionConfig, WeightTriple};
use crate::constants::{
    BEARISH_BUY_DOWNGRADE, CONFLICT_STD_DEV, DEFAULT_FUNDAMENTAL_WEIGHT, DEFAULT_SENTIMENT_WEIGHT,
    DEFAULT_TECHNICAL_WEIGHT, DIRECTIONAL_BAND, MAX_DATA_QUALITY_PENALTY, PRICE_BAND, STRONG_SIGNAL,
    VOLATILE_BUY_DOWNGRADE, VOLATILE_SELL_DOWNGRADE,
};
use crate::core::now_unix;
use crate::core::trade_levels::TradeLevelCalculator;
use crate::errors::FusionError;
use crate::types::{
    Action, ConfidenceBreakdown, Direction, FusionWeights, Fundamentals, IndicatorSet,
    MarketContext, MarketState, NoTradeSignal, PriceRange, Recommendation, SentimentInput,
    WeightSource,
};

/// Fuses the three analysis scores under market-dependent weights.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    static_weights: WeightTriple,
    weight_table: HashMap<MarketState, WeightTriple>,
    buy_threshold: Decimal,
    sell_threshold: Decimal,
    trade_levels: TradeLevelCalculator,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        let static_weights = config.static_weights;
        if (static_weights.total() - dec!(1)).abs() > dec!(0.001) {
            info!(total = %static_weights.total(), "static weights don't sum to 1.0, normalizing");
        }
        Self {
            static_weights,
            weight_table: config.weight_table,
            buy_threshold: config.buy_threshold,
            sell_threshold: config.sell_threshold,
            trade_levels: TradeLevelCalculator::new(config.trade_levels),
        }
    }

    // -----------------------------------------------------------------------
    // Weights
    // -----------------------------------------------------------------------

    /// Weights for the current market. No context means the static weights;
    /// a state without a table entry falls back to them too.
    pub fn select_weights(&self, context: Option<&MarketContext>) -> FusionWeights {
        let Some(ctx) = context else {
            return normalize_weights(self.static_weights, WeightSource::Static);
        };

        match self.weight_table.get(&ctx.market_state) {
            Some(&triple) => normalize_weights(triple, dynamic_source(ctx.market_state)),
            None => {
                warn!(
                    state = %ctx.market_state,
                    "no weights for market state, using static weights"
                );
                normalize_weights(self.static_weights, WeightSource::StaticFallback)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Recommendation
    // -----------------------------------------------------------------------

    /// Fuse the three signals into a [`Recommendation`].
    ///
    /// # Errors
    /// [`FusionError::InvalidInput`] when `current_price` is not positive.
    pub fn generate_recommendation(
        &self,
        sentiment: &SentimentInput,
        technical: &IndicatorSet,
        fundamentals: &Fundamentals,
        current_price: Decimal,
        context: Option<&MarketContext>,
    ) -> Result<Recommendation, FusionError> {
        if current_price <= Decimal::ZERO {
            return Err(FusionError::InvalidInput {
                reason: format!("current price must be positive, got {current_price}"),
            });
        }

        let weights = self.select_weights(context);
        info!(
            source = ?weights.source,
            sentiment = %weights.sentiment,
            technical = %weights.technical,
            fundamental = %weights.fundamental,
            "active fusion weights"
        );

        let sentiment_contribution = sentiment.score * weights.sentiment;
        let technical_contribution = technical.technical_score * weights.technical;
        let fundamental_contribution = fundamentals.score * weights.fundamental;
        let combined = sentiment_contribution + technical_contribution + fundamental_contribution;

        let raw_action = self.action_for(combined);
        let (confidence, confidence_breakdown) =
            self.calculate_confidence(sentiment, technical, fundamentals, combined, context);

        let action = match context {
            Some(ctx) => self.adjust_for_market_context(raw_action, combined, ctx),
            None => raw_action,
        };

        let mut entry_range = None;
        let mut exit_range = None;
        let mut trade_levels = None;
        match action {
            Action::Buy => {
                entry_range = Some(suggest_price_range(action, current_price, technical));
                trade_levels = match self.trade_levels.calculate(current_price, technical, action) {
                    Ok(levels) => Some(levels),
                    Err(FusionError::InvalidInput { reason }) => {
                        warn!(%reason, "trade levels unavailable");
                        None
                    }
                    Err(e) => return Err(e),
                };
            }
            Action::Sell => {
                exit_range = Some(suggest_price_range(action, current_price, technical));
            }
            Action::Hold => {}
        }

        let reasoning = generate_reasoning(
            action,
            combined,
            confidence,
            sentiment,
            technical,
            fundamentals,
            context,
        );

        info!(%action, %combined, %confidence, "recommendation generated");

        Ok(Recommendation {
            action,
            confidence,
            combined_score: combined,
            entry_range,
            exit_range,
            reasoning,
            sentiment_contribution,
            technical_contribution,
            fundamental_contribution,
            confidence_breakdown,
            weights,
            trade_levels,
            timestamp: now_unix(),
        })
    }

    fn action_for(&self, combined: Decimal) -> Action {
        if combined > self.buy_threshold {
            Action::Buy
        } else if combined < self.sell_threshold {
            Action::Sell
        } else {
            Action::Hold
        }
    }

    fn direction_for(&self, combined: Decimal) -> Direction {
        match self.action_for(combined) {
            Action::Buy => Direction::Bullish,
            Action::Sell => Direction::Bearish,
            Action::Hold => Direction::Neutral,
        }
    }

    /// Downgrade weak signals to HOLD in volatile or bearish markets.
    pub fn adjust_for_market_context(
        &self,
        action: Action,
        combined: Decimal,
        ctx: &MarketContext,
    ) -> Action {
        match (ctx.market_state, action) {
            (MarketState::Volatile, Action::Buy) if combined < VOLATILE_BUY_DOWNGRADE => {
                info!(vix = %ctx.vix_value, "downgrading BUY to HOLD in volatile market");
                Action::Hold
            }
            (MarketState::Volatile, Action::Sell) if combined > VOLATILE_SELL_DOWNGRADE => {
                info!(vix = %ctx.vix_value, "downgrading SELL to HOLD in volatile market");
                Action::Hold
            }
            (MarketState::Bearish, Action::Buy) if combined < BEARISH_BUY_DOWNGRADE => {
                info!("downgrading BUY to HOLD in bearish market");
                Action::Hold
            }
            _ => action,
        }
    }

    // -----------------------------------------------------------------------
    // Confidence
    // -----------------------------------------------------------------------

    /// Confidence in [0, 1] with its breakdown.
    ///
    /// Agreement is judged against the direction implied by `combined`
    /// before any market-context downgrade.
    pub fn calculate_confidence(
        &self,
        sentiment: &SentimentInput,
        technical: &IndicatorSet,
        fundamentals: &Fundamentals,
        combined: Decimal,
        context: Option<&MarketContext>,
    ) -> (Decimal, ConfidenceBreakdown) {
        let direction = self.direction_for(combined);

        let mut agreements = [sentiment.score, technical.technical_score, fundamentals.score]
            .iter()
            .filter(|&&score| agrees_with(score, direction))
            .count();

        let agreement_score = match context {
            Some(ctx) => {
                if market_agrees(ctx.market_state, direction) {
                    agreements += 1;
                }
                match agreements {
                    4 => dec!(0.85),
                    3 => dec!(0.75),
                    2 => dec!(0.65),
                    _ => dec!(0.45),
                }
            }
            None => match agreements {
                3 => dec!(0.80),
                2 => dec!(0.70),
                _ => dec!(0.50),
            },
        };

        let sources = sentiment.source_count;
        let mut sentiment_conf = if sentiment.confidence > Decimal::ZERO {
            sentiment.confidence
        } else {
            dec!(0.5)
        };
        if sources < 2 {
            sentiment_conf *= dec!(0.7);
        } else if sources >= 5 {
            sentiment_conf = (sentiment_conf * dec!(1.1)).min(dec!(1));
        }

        let magnitude = technical.technical_score.abs();
        let technical_conf = if magnitude < DIRECTIONAL_BAND {
            dec!(0.5)
        } else if magnitude > STRONG_SIGNAL {
            dec!(0.95)
        } else {
            dec!(0.8)
        };

        let missing = fundamentals.missing_core_metrics();
        let fundamental_conf = match missing {
            0 => dec!(0.9),
            1 => dec!(0.7),
            _ => dec!(0.5),
        };

        let (signal_quality, favorability) = context
            .map(|ctx| (ctx.signal_quality, ctx.favorability))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));

        let mut penalty = Decimal::ZERO;
        if context.is_none() {
            penalty += dec!(0.05);
        }
        if sources < 2 {
            penalty += dec!(0.10);
        } else if sources < 3 {
            penalty += dec!(0.05);
        }
        if missing >= 2 {
            penalty += dec!(0.10);
        } else if missing == 1 {
            penalty += dec!(0.05);
        }
        // Zero score with no sources looks like a failed upstream fetch.
        if sentiment.score.is_zero() && sources == 0 {
            penalty += dec!(0.15);
        }
        let penalty = penalty.min(MAX_DATA_QUALITY_PENALTY);

        let blended = agreement_score * dec!(0.6)
            + sentiment_conf * dec!(0.15)
            + technical_conf * dec!(0.10)
            + fundamental_conf * dec!(0.10)
            + favorability * dec!(0.05);
        let confidence = (blended * (dec!(1) - penalty)).clamp(Decimal::ZERO, dec!(1));

        let voters = if context.is_some() { 4 } else { 3 };
        debug!(
            agreements,
            voters,
            %agreement_score,
            %penalty,
            %confidence,
            "confidence calculated"
        );

        let breakdown = ConfidenceBreakdown {
            sentiment_confidence: round2(sentiment_conf),
            technical_confidence: round2(technical_conf),
            fundamental_confidence: round2(fundamental_conf),
            market_signal_quality: round2(signal_quality),
            market_favorability: round2(favorability),
            agreement_score: round2(agreement_score),
            data_quality_penalty: round2(penalty),
        };

        (confidence, breakdown)
    }

    // -----------------------------------------------------------------------
    // Gating
    // -----------------------------------------------------------------------

    /// Block a BUY when the no-trade gate fires. Everything else passes
    /// through unchanged.
    pub fn apply_no_trade_gate(
        &self,
        mut recommendation: Recommendation,
        signal: &NoTradeSignal,
    ) -> Recommendation {
        if !signal.is_no_trade || recommendation.action != Action::Buy {
            return recommendation;
        }

        warn!(
            severity = %signal.severity,
            reasons = signal.reasons.len(),
            "no-trade gate blocked BUY"
        );

        recommendation.action = Action::Hold;
        recommendation.entry_range = None;
        recommendation.trade_levels = None;
        recommendation.reasoning.push_str(&format!(
            "\n\nNo-Trade Gate ({} severity): BUY blocked. {}. {}",
            signal.severity,
            signal.reasons.join("; "),
            signal.suggested_action
        ));
        recommendation
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Free functions
// ═══════════════════════════════════════════════════════════════════════════

/// Scale weights to sum to 1. A zero total resets to the default split.
pub fn normalize_weights(triple: WeightTriple, source: WeightSource) -> FusionWeights {
    let total = triple.total();
    if total.is_zero() {
        return FusionWeights {
            sentiment: DEFAULT_SENTIMENT_WEIGHT,
            technical: DEFAULT_TECHNICAL_WEIGHT,
            fundamental: DEFAULT_FUNDAMENTAL_WEIGHT,
            source,
        };
    }
    FusionWeights {
        sentiment: triple.sentiment / total,
        technical: triple.technical / total,
        fundamental: triple.fundamental / total,
        source,
    }
}

fn dynamic_source(state: MarketState) -> WeightSource {
    match state {
        MarketState::Bullish => WeightSource::DynamicBullish,
        MarketState::Neutral => WeightSource::DynamicNeutral,
        MarketState::Bearish => WeightSource::DynamicBearish,
        MarketState::Volatile => WeightSource::DynamicVolatile,
    }
}

fn agrees_with(score: Decimal, direction: Direction) -> bool {
    match direction {
        Direction::Bullish => score > DIRECTIONAL_BAND,
        Direction::Bearish => score < -DIRECTIONAL_BAND,
        Direction::Neutral => score.abs() <= DIRECTIONAL_BAND,
    }
}

fn market_agrees(state: MarketState, direction: Direction) -> bool {
    match direction {
        Direction::Bullish => matches!(state, MarketState::Bullish | MarketState::Neutral),
        Direction::Bearish => matches!(state, MarketState::Bearish | MarketState::Neutral),
        Direction::Neutral => state == MarketState::Neutral,
    }
}

/// Entry band for BUY and exit band for SELL.
///
/// BUY runs from the nearest support below the price (or -2%) to +2%.
/// SELL runs from -2% to the nearest resistance above the price (or +2%).
pub fn suggest_price_range(
    action: Action,
    current_price: Decimal,
    technical: &IndicatorSet,
) -> PriceRange {
    let low = current_price * (dec!(1) - PRICE_BAND);
    let high = current_price * (dec!(1) + PRICE_BAND);

    match action {
        Action::Buy => PriceRange {
            low: technical.nearest_support_below(current_price).unwrap_or(low),
            high,
        },
        Action::Sell => PriceRange {
            low,
            high: technical.nearest_resistance_above(current_price).unwrap_or(high),
        },
        Action::Hold => PriceRange { low, high },
    }
}

/// Label for a score in [-1, 1].
pub fn describe_score(score: Decimal) -> &'static str {
    if score > dec!(0.5) {
        "Very bullish"
    } else if score > DIRECTIONAL_BAND {
        "Bullish"
    } else if score > -DIRECTIONAL_BAND {
        "Neutral"
    } else if score > dec!(-0.5) {
        "Bearish"
    } else {
        "Very bearish"
    }
}

/// Population standard deviation of the three signal scores.
fn score_dispersion(scores: [Decimal; 3]) -> f64 {
    let values: Vec<f64> = scores.iter().map(|s| s.to_f64().unwrap_or(0.0)).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn signed(value: Decimal) -> String {
    let rounded = round2(value);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("{rounded:.2}")
    } else {
        format!("+{:.2}", rounded.abs())
    }
}

fn percent(value: Decimal) -> String {
    format!("{:.0}%", (value * dec!(100)).round())
}

pub fn describe_market_context(ctx: &MarketContext) -> String {
    format!(
        "Market is {}. Nifty 50 is {}. Bank Nifty is {}. Volatility (VIX) is {} at {:.1}.",
        ctx.market_state,
        ctx.nifty_trend,
        ctx.bank_nifty_trend,
        ctx.vix_level.describe(),
        ctx.vix_value.round_dp(1)
    )
}

/// Human-readable explanation, one paragraph per line of evidence.
pub fn generate_reasoning(
    action: Action,
    combined: Decimal,
    confidence: Decimal,
    sentiment: &SentimentInput,
    technical: &IndicatorSet,
    fundamentals: &Fundamentals,
    context: Option<&MarketContext>,
) -> String {
    let mut parts = vec![
        format!(
            "Recommendation: {action} with {} confidence (combined score: {})",
            percent(confidence),
            signed(combined)
        ),
        format!(
            "Sentiment Analysis: {} (score: {}, confidence: {}, sources: {})",
            describe_score(sentiment.score),
            signed(sentiment.score),
            percent(sentiment.confidence),
            sentiment.source_count
        ),
        format!(
            "Technical Analysis: {} (score: {}, RSI: {:.1}, MACD: {})",
            describe_score(technical.technical_score),
            signed(technical.technical_score),
            technical.rsi.round_dp(1),
            signed(technical.macd)
        ),
        format!(
            "Fundamental Analysis: {} (score: {}, P/E: {})",
            describe_score(fundamentals.score),
            signed(fundamentals.score),
            fundamentals
                .pe_ratio
                .map(|pe| format!("{:.1}", pe.round_dp(1)))
                .unwrap_or_else(|| "N/A".to_string())
        ),
    ];

    let scores = [sentiment.score, technical.technical_score, fundamentals.score];
    if score_dispersion(scores) > CONFLICT_STD_DEV {
        parts.push(
            "Note: Conflicting signals detected between analyzers. \
             Exercise caution and consider waiting for clearer signals."
                .to_string(),
        );
    }

    if let Some(ctx) = context {
        parts.push(format!("Market Context: {}", describe_market_context(ctx)));
    }

    parts.join("\n\n")
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
