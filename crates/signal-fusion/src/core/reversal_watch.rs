//! Reversal watch: flags oversold instruments with fair fundamentals in a
//! non-panicking market, and scores how many bounce confirmations are in.
//!
//! Annotation only. A setup never changes the recommendation's action.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use crate::config::ReversalWatchConfig;
use crate::types::{
    Fundamentals, IndicatorSet, MarketContext, MarketState, PricePoint, Regime, ReversalStatus,
    ReversalTrigger, ReversalWatch,
};

#[derive(Debug, Clone)]
pub struct ReversalWatchDetector {
    config: ReversalWatchConfig,
}

impl ReversalWatchDetector {
    pub fn new(config: ReversalWatchConfig) -> Self {
        Self { config }
    }

    /// Whether fundamentals are at least fair. The first failed check is the
    /// reason; unknown ratios are skipped.
    pub fn check_fundamental_quality(&self, f: &Fundamentals) -> (bool, String) {
        let cfg = &self.config;

        if f.score < Decimal::ZERO {
            return (false, "Fundamental score is negative (poor fundamentals)".to_string());
        }

        let mut passed = Vec::new();

        if let Some(pe) = f.pe_ratio {
            if pe > cfg.max_pe_ratio {
                return (
                    false,
                    format!("P/E ratio too high ({:.1} > {})", pe.round_dp(1), cfg.max_pe_ratio),
                );
            }
            passed.push(format!("P/E: {:.1}", pe.round_dp(1)));
        }

        if let Some(pb) = f.pb_ratio {
            if pb > cfg.max_pb_ratio {
                return (
                    false,
                    format!("P/B ratio too high ({:.1} > {})", pb.round_dp(1), cfg.max_pb_ratio),
                );
            }
            passed.push(format!("P/B: {:.1}", pb.round_dp(1)));
        }

        if let Some(de) = f.debt_to_equity {
            if de > cfg.max_debt_to_equity {
                return (
                    false,
                    format!(
                        "Debt-to-equity too high ({:.1} > {})",
                        de.round_dp(1),
                        cfg.max_debt_to_equity
                    ),
                );
            }
            passed.push(format!("D/E: {:.1}", de.round_dp(1)));
        }

        if let Some(growth) = f.revenue_growth {
            if growth < cfg.min_revenue_growth {
                return (
                    false,
                    format!(
                        "Revenue declining rapidly ({:.1}% < {}%)",
                        growth.round_dp(1),
                        cfg.min_revenue_growth
                    ),
                );
            }
            passed.push(format!("Revenue growth: {:.1}%", growth.round_dp(1)));
        }

        if passed.is_empty() {
            (true, "Fundamentals are acceptable".to_string())
        } else {
            (true, format!("Fair fundamentals: {}", passed.join(", ")))
        }
    }

    /// Whether the broad market is panicking. No context is treated as calm.
    pub fn check_market_panic(&self, context: Option<&MarketContext>) -> (bool, String) {
        let Some(ctx) = context else {
            return (false, "No market context available (assuming not panic)".to_string());
        };
        let vix = ctx.vix_value.round_dp(1);

        if ctx.vix_value > self.config.panic_vix {
            return (
                true,
                format!("VIX extremely high ({vix:.1} > {}) - market panic", self.config.panic_vix),
            );
        }
        if ctx.market_state == MarketState::Volatile
            && ctx.vix_value > self.config.volatile_panic_vix
        {
            return (true, format!("Volatile market with high VIX ({vix:.1})"));
        }

        (false, format!("Market not in panic (VIX: {vix:.1})"))
    }

    /// RSI recovery, MACD momentum and volume spike, always in that order.
    pub fn check_reversal_triggers(
        &self,
        technical: &IndicatorSet,
        prices: &[PricePoint],
    ) -> Vec<ReversalTrigger> {
        let cfg = &self.config;

        let rsi_met = technical.rsi > cfg.rsi_recovery;
        let rsi = ReversalTrigger {
            name: "RSI Recovery".to_string(),
            met: rsi_met,
            value: technical.rsi,
            threshold: cfg.rsi_recovery,
            description: format!(
                "RSI recovering from oversold (current: {:.1})",
                technical.rsi.round_dp(1)
            ),
        };

        let histogram = technical.macd_histogram();
        let macd_met = histogram > Decimal::ZERO;
        let macd = ReversalTrigger {
            name: "MACD Momentum".to_string(),
            met: macd_met,
            value: histogram,
            threshold: Decimal::ZERO,
            description: format!(
                "MACD histogram {} ({:.2})",
                if macd_met { "positive" } else { "negative" },
                histogram.round_dp(2)
            ),
        };

        vec![rsi, macd, self.volume_trigger(prices)]
    }

    fn volume_trigger(&self, prices: &[PricePoint]) -> ReversalTrigger {
        let lookback = self.config.volume_lookback;
        let threshold = self.config.volume_spike_ratio;

        let (Some(last), true) = (prices.last(), lookback > 0 && prices.len() >= lookback) else {
            return ReversalTrigger {
                name: "Volume Spike".to_string(),
                met: false,
                value: Decimal::ZERO,
                threshold,
                description: "Insufficient data for volume analysis".to_string(),
            };
        };

        let window = &prices[prices.len() - lookback..];
        let avg = window.iter().map(|p| p.volume).sum::<Decimal>() / Decimal::from(lookback as u64);
        let ratio = if avg > Decimal::ZERO { last.volume / avg } else { dec!(1) };
        let met = ratio > threshold;

        ReversalTrigger {
            name: "Volume Spike".to_string(),
            met,
            value: ratio,
            threshold,
            description: format!(
                "Volume {} ({:.1}x average)",
                if met { "spike" } else { "normal" },
                ratio.round_dp(1)
            ),
        }
    }

    /// Evaluate the three setup gates, then score the triggers.
    pub fn detect(
        &self,
        technical: &IndicatorSet,
        fundamentals: &Fundamentals,
        context: Option<&MarketContext>,
        prices: &[PricePoint],
    ) -> ReversalWatch {
        if technical.regime != Regime::OversoldZone {
            return not_applicable(format!(
                "Not in oversold zone (current regime: {})",
                technical.regime
            ));
        }
        let mut passed = vec!["In oversold zone".to_string()];

        let (fair, fundamentals_reason) = self.check_fundamental_quality(fundamentals);
        if !fair {
            return not_applicable(format!("Oversold but poor fundamentals: {fundamentals_reason}"));
        }
        passed.push(fundamentals_reason);

        let (panic, panic_reason) = self.check_market_panic(context);
        if panic {
            return not_applicable(format!("Oversold with fair fundamentals but {panic_reason}"));
        }
        passed.push(panic_reason);

        let triggers = self.check_reversal_triggers(technical, prices);
        let met = triggers.iter().filter(|t| t.met).count();
        let total = triggers.len();

        let (status, confidence, summary) = if met == total {
            (
                ReversalStatus::Triggered,
                dec!(0.85),
                format!("All {total} reversal triggers met"),
            )
        } else if met >= 2 {
            (
                ReversalStatus::WatchOnly,
                dec!(0.65),
                format!("{met}/{total} reversal triggers met - watch closely"),
            )
        } else {
            (
                ReversalStatus::WatchOnly,
                dec!(0.45),
                format!("{met}/{total} reversal triggers met - early stage"),
            )
        };

        let mut lines: Vec<String> = passed
            .into_iter()
            .map(|reason| format!("[ok] {reason}"))
            .collect();
        lines.push(summary);

        info!(%status, met, total, %confidence, "reversal setup detected");

        ReversalWatch {
            is_setup: true,
            status,
            triggers,
            confidence,
            reasoning: lines.join("\n"),
        }
    }
}

fn not_applicable(reasoning: String) -> ReversalWatch {
    debug!(%reasoning, "no reversal setup");
    ReversalWatch {
        is_setup: false,
        status: ReversalStatus::NotApplicable,
        triggers: Vec::new(),
        confidence: Decimal::ZERO,
        reasoning,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
