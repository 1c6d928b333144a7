//! No-trade gate: system-wide veto on new long entries in dangerous markets.
//!
//! Rules are evaluated in a fixed order and severity only ever rises. A gate
//! fires when at least one rule matched at medium severity or above. SELL and
//! HOLD recommendations are never blocked.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::config::NoTradeConfig;
use crate::constants::NO_TRADE_VOLATILE_VIX;
use crate::types::{
    Action, Direction, MarketContext, MarketState, NoTradeSignal, Severity, VixLevel,
};

const ACTION_HIGH: &str =
    "Stay in cash. Avoid all new positions. Consider reducing existing positions if possible.";
const ACTION_MEDIUM: &str = "Exercise extreme caution. Only consider high-conviction trades \
                             with tight stop losses. Prefer cash.";
const ACTION_CLEAR: &str = "Market conditions allow trading, but remain vigilant";

/// Market-wide trading veto.
#[derive(Debug, Clone)]
pub struct NoTradeGate {
    enabled: bool,
    vix_spike_threshold: Decimal,
    nifty_drop_threshold: Decimal,
}

impl NoTradeGate {
    pub fn from_config(config: &NoTradeConfig) -> Self {
        info!(
            enabled = config.enabled,
            vix_spike_threshold = %config.vix_spike_threshold,
            nifty_drop_threshold = %config.nifty_drop_threshold,
            "no-trade gate initialized"
        );
        Self {
            enabled: config.enabled,
            vix_spike_threshold: config.vix_spike_threshold,
            nifty_drop_threshold: config.nifty_drop_threshold,
        }
    }

    /// Evaluate every rule against the market context.
    ///
    /// Checks (in order): bearish with elevated VIX, index below its 50-period
    /// average, VIX spike, both indices bearish, volatile market.
    pub fn check_market_conditions(&self, context: Option<&MarketContext>) -> NoTradeSignal {
        if !self.enabled {
            return NoTradeSignal {
                is_no_trade: false,
                reasons: Vec::new(),
                suggested_action: "Trading enabled".to_string(),
                severity: Severity::Low,
            };
        }

        let Some(ctx) = context else {
            return NoTradeSignal {
                is_no_trade: false,
                reasons: vec!["No market context available".to_string()],
                suggested_action: "Proceed with caution".to_string(),
                severity: Severity::Low,
            };
        };

        let mut reasons = Vec::new();
        let mut severity = Severity::Low;

        // 1. Bearish market with elevated volatility
        if ctx.market_state == MarketState::Bearish && ctx.vix_level.is_elevated() {
            reasons.push(format!(
                "Market is bearish with {} volatility (VIX: {:.1})",
                ctx.vix_level.as_str().replace('_', " "),
                ctx.vix_value.round_dp(1)
            ));
            severity = Severity::High;
        }

        // 2. Broad index well below its 50-period average
        if let Some(distance) = ctx.nifty_vs_50dma() {
            if distance < -self.nifty_drop_threshold {
                reasons.push(format!(
                    "Nifty 50 is {:.1}% below its 50-day moving average ({} vs {})",
                    (distance.abs() * dec!(100)).round_dp(1),
                    ctx.nifty_price.round(),
                    ctx.nifty_50dma.round()
                ));
                severity = severity.max(Severity::Medium);
            }
        }

        // 3. VIX spike
        if ctx.vix_value > self.vix_spike_threshold {
            reasons.push(format!(
                "VIX spike detected: {:.1} (threshold: {:.1}) - extreme market fear",
                ctx.vix_value.round_dp(1),
                self.vix_spike_threshold.round_dp(1)
            ));
            severity = Severity::High;
        }

        // 4. Both indices bearish with above-calm volatility
        if ctx.nifty_trend == Direction::Bearish
            && ctx.bank_nifty_trend == Direction::Bearish
            && ctx.vix_level != VixLevel::Low
        {
            reasons.push(
                "Both Nifty 50 and Bank Nifty are bearish with elevated volatility".to_string(),
            );
            severity = severity.max(Severity::Medium);
        }

        // 5. Volatile market
        if ctx.market_state == MarketState::Volatile && ctx.vix_value > NO_TRADE_VOLATILE_VIX {
            reasons.push(format!(
                "Market is highly volatile (VIX: {:.1})",
                ctx.vix_value.round_dp(1)
            ));
            severity = severity.max(Severity::Medium);
        }

        let is_no_trade = !reasons.is_empty() && severity >= Severity::Medium;
        let suggested_action = match (is_no_trade, severity) {
            (true, Severity::High) => ACTION_HIGH,
            (true, _) => ACTION_MEDIUM,
            (false, _) => ACTION_CLEAR,
        };

        if is_no_trade {
            warn!(%severity, reasons = reasons.len(), "no-trade signal triggered");
        }

        NoTradeSignal {
            is_no_trade,
            reasons,
            suggested_action: suggested_action.to_string(),
            severity,
        }
    }

    /// Only BUY recommendations are ever blocked.
    pub fn should_block_recommendation(
        &self,
        action: Action,
        context: Option<&MarketContext>,
    ) -> bool {
        if action != Action::Buy {
            return false;
        }
        let blocked = self.check_market_conditions(context).is_no_trade;
        if blocked {
            info!("blocking BUY recommendation due to no-trade signal");
        }
        blocked
    }

    /// Market safety in [0, 1]: 1 is calm, 0 is dangerous, 0.5 without context.
    pub fn market_safety_score(&self, context: Option<&MarketContext>) -> Decimal {
        let Some(ctx) = context else {
            return dec!(0.5);
        };

        let mut score = dec!(1);
        score -= match ctx.market_state {
            MarketState::Bearish => dec!(0.3),
            MarketState::Volatile => dec!(0.4),
            _ => Decimal::ZERO,
        };
        score -= match ctx.vix_level {
            VixLevel::VeryHigh => dec!(0.4),
            VixLevel::High => dec!(0.3),
            VixLevel::Moderate => dec!(0.1),
            VixLevel::Low => Decimal::ZERO,
        };
        if let Some(distance) = ctx.nifty_vs_50dma() {
            if distance < dec!(-0.05) {
                score -= dec!(0.3);
            } else if distance < dec!(-0.03) {
                score -= dec!(0.2);
            }
        }

        score.clamp(Decimal::ZERO, dec!(1))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
