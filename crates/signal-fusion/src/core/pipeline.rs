//! End-to-end evaluation of one instrument.
//!
//! The indicator engine and the market context provider are independent and
//! run concurrently on the blocking pool. Fusion, the no-trade gate and the
//! reversal watch then run in order on their outputs.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{IndicatorParams, SignalFusionConfig};
use crate::core::fusion::FusionEngine;
use crate::core::indicators;
use crate::core::market_context::MarketContextProvider;
use crate::core::no_trade::NoTradeGate;
use crate::core::reversal_watch::ReversalWatchDetector;
use crate::types::{
    Fundamentals, IndicatorSet, MarketContext, MarketHistories, NoTradeSignal, PricePoint,
    Recommendation, ReversalWatch, SentimentInput,
};

fn default_true() -> bool {
    true
}

/// One evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub symbol: String,
    /// Chronological instrument history, oldest first.
    pub prices: Vec<PricePoint>,
    pub sentiment: SentimentInput,
    pub fundamentals: Fundamentals,
    /// Broad market histories. Absent means no market context at all.
    #[serde(default)]
    pub market: Option<MarketHistories>,
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub symbol: String,
    pub indicators: IndicatorSet,
    pub market_context: Option<MarketContext>,
    /// Final recommendation, after the no-trade gate.
    pub recommendation: Recommendation,
    pub no_trade: NoTradeSignal,
    pub reversal_watch: ReversalWatch,
}

/// Owns every component. Cheap to share behind an `Arc`.
pub struct Pipeline {
    indicator_params: IndicatorParams,
    market: Arc<MarketContextProvider>,
    fusion: FusionEngine,
    no_trade: NoTradeGate,
    reversal: ReversalWatchDetector,
}

impl Pipeline {
    pub fn new(config: &SignalFusionConfig) -> Self {
        Self {
            indicator_params: config.indicators.clone(),
            market: Arc::new(MarketContextProvider::new(config.market_context.clone())),
            fusion: FusionEngine::new(config.fusion.clone()),
            no_trade: NoTradeGate::from_config(&config.gating.no_trade),
            reversal: ReversalWatchDetector::new(config.gating.reversal_watch.clone()),
        }
    }

    pub fn market_provider(&self) -> &Arc<MarketContextProvider> {
        &self.market
    }

    /// Evaluate one request.
    ///
    /// Fails when the instrument history is too short or malformed, or when
    /// its last close is not a usable price.
    pub async fn evaluate(&self, request: AnalysisRequest) -> Result<AnalysisOutcome> {
        let AnalysisRequest {
            symbol,
            prices,
            sentiment,
            fundamentals,
            market,
            use_cache,
        } = request;
        let prices = Arc::new(prices);

        let indicator_task = {
            let prices = Arc::clone(&prices);
            let params = self.indicator_params.clone();
            async move {
                tokio::task::spawn_blocking(move || indicators::analyze(&prices, &params))
                    .await
                    .context("indicator task failed to complete")?
                    .context("indicator analysis failed")
            }
        };

        let market_task = {
            let provider = Arc::clone(&self.market);
            async move {
                let Some(histories) = market else {
                    return Ok(None);
                };
                let context = tokio::task::spawn_blocking(move || {
                    provider.get_market_context(&histories, use_cache)
                })
                .await
                .context("market context task failed to complete")?;
                Ok::<_, anyhow::Error>(Some(context))
            }
        };

        let (technical, context) = tokio::try_join!(indicator_task, market_task)?;
        let context = context.as_deref();
        if context.is_none() {
            warn!(%symbol, "evaluating without market context");
        }

        // analyze() only succeeds on a non-empty history
        let current_price = prices
            .last()
            .map(|p| p.close)
            .context("empty price history")?;

        let recommendation = self
            .fusion
            .generate_recommendation(&sentiment, &technical, &fundamentals, current_price, context)
            .with_context(|| format!("fusion failed for {symbol}"))?;

        let no_trade = self.no_trade.check_market_conditions(context);
        let recommendation = self.fusion.apply_no_trade_gate(recommendation, &no_trade);

        let reversal_watch = self.reversal.detect(&technical, &fundamentals, context, &prices);

        info!(
            %symbol,
            action = %recommendation.action,
            confidence = %recommendation.confidence,
            gated = no_trade.is_no_trade,
            reversal = %reversal_watch.status,
            "evaluation complete"
        );

        Ok(AnalysisOutcome {
            symbol,
            indicators: technical,
            market_context: context.cloned(),
            recommendation,
            no_trade,
            reversal_watch,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, MarketState, ReversalStatus};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn series(closes: impl IntoIterator<Item = Decimal>) -> Vec<PricePoint> {
        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| PricePoint {
                timestamp: 1_700_000_000 + i as i64 * 86_400,
                open: close,
                high: close + dec!(1),
                low: close - dec!(1),
                close,
                volume: dec!(1000),
            })
            .collect()
    }

    fn rising(n: u64, start: Decimal) -> Vec<PricePoint> {
        series((0..n).map(|i| start + Decimal::from(i)))
    }

    /// Uptrend of 0.5 per bar with a ±2 alternating wiggle.
    fn choppy_uptrend(n: u64) -> Vec<PricePoint> {
        series((0..n).map(|i| {
            let wiggle = if i % 2 == 0 { dec!(2) } else { dec!(-2) };
            dec!(100) + dec!(0.5) * Decimal::from(i) + wiggle
        }))
    }

    fn falling(n: u64, start: Decimal) -> Vec<PricePoint> {
        series((0..n).map(|i| start - Decimal::from(i)))
    }

    fn request(market: Option<MarketHistories>) -> AnalysisRequest {
        AnalysisRequest {
            symbol: "RELIANCE".to_string(),
            prices: choppy_uptrend(240),
            sentiment: SentimentInput {
                score: dec!(0.9),
                confidence: dec!(0.9),
                source_count: 12,
            },
            fundamentals: Fundamentals {
                pe_ratio: Some(dec!(18)),
                pb_ratio: Some(dec!(2)),
                debt_to_equity: Some(dec!(0.5)),
                eps: Some(dec!(40)),
                revenue_growth: Some(dec!(12)),
                industry_avg_pe: Some(dec!(22)),
                score: dec!(0.8),
                confidence: dec!(0.85),
            },
            market,
            use_cache: true,
        }
    }

    fn panicking_market() -> MarketHistories {
        MarketHistories {
            nifty: Some(falling(60, dec!(24000))),
            bank_nifty: Some(falling(60, dec!(52000))),
            vix: Some(series([dec!(28), dec!(31)])),
        }
    }

    fn calm_bull_market() -> MarketHistories {
        MarketHistories {
            nifty: Some(rising(60, dec!(22000))),
            bank_nifty: Some(rising(60, dec!(48000))),
            vix: Some(series([dec!(13)])),
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(&SignalFusionConfig::default())
    }

    #[tokio::test]
    async fn test_evaluate_without_market_context() {
        let outcome = pipeline().evaluate(request(None)).await.unwrap();

        assert_eq!(outcome.symbol, "RELIANCE");
        assert!(outcome.market_context.is_none());
        assert!(!outcome.no_trade.is_no_trade);
        assert_eq!(outcome.indicators.price, dec!(217.5));
        assert_eq!(outcome.reversal_watch.status, ReversalStatus::NotApplicable);
    }

    #[tokio::test]
    async fn test_calm_market_allows_buy_with_levels() {
        let outcome = pipeline()
            .evaluate(request(Some(calm_bull_market())))
            .await
            .unwrap();

        let ctx = outcome.market_context.as_ref().unwrap();
        assert_eq!(ctx.market_state, MarketState::Bullish);
        assert!(!outcome.no_trade.is_no_trade);
        assert_eq!(outcome.recommendation.action, Action::Buy);

        let levels = outcome.recommendation.trade_levels.as_ref().unwrap();
        assert!(levels.stop_loss < levels.ideal_entry && levels.ideal_entry < levels.target);
    }

    #[tokio::test]
    async fn test_panicking_market_blocks_buy() {
        let outcome = pipeline()
            .evaluate(request(Some(panicking_market())))
            .await
            .unwrap();

        assert!(outcome.no_trade.is_no_trade);
        assert_ne!(outcome.recommendation.action, Action::Buy);
        assert!(outcome.recommendation.trade_levels.is_none());
    }

    #[tokio::test]
    async fn test_short_history_is_an_error() {
        let mut req = request(None);
        req.prices.truncate(20);
        let err = pipeline().evaluate(req).await.unwrap_err();
        assert!(format!("{err:#}").contains("insufficient data"));
    }

    #[tokio::test]
    async fn test_market_context_is_cached_across_requests() {
        let p = pipeline();
        let first = p.evaluate(request(Some(calm_bull_market()))).await.unwrap();
        assert!(p.market_provider().cache_age().is_some());

        // Different histories, same cached snapshot.
        let second = p.evaluate(request(Some(panicking_market()))).await.unwrap();
        assert_eq!(first.market_context, second.market_context);

        let mut bypass = request(Some(panicking_market()));
        bypass.use_cache = false;
        let third = p.evaluate(bypass).await.unwrap();
        assert_ne!(first.market_context, third.market_context);
    }

    #[test]
    fn test_request_defaults() {
        let json = r#"{
            "symbol": "TCS",
            "prices": [],
            "sentiment": {"score": "0.1", "confidence": "0.5", "source_count": 3},
            "fundamentals": {"score": "0", "confidence": "0.4"}
        }"#;
        let req: AnalysisRequest = serde_json::from_str(json).unwrap();
        assert!(req.use_cache);
        assert!(req.market.is_none());
        assert!(req.fundamentals.pe_ratio.is_none());
    }
}
