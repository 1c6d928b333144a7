//! Entry, stop-loss, target and position size for BUY recommendations.
//!
//! Stops blend an ATR distance with the nearest support and are floored at a
//! maximum stop distance. Targets aim for the nearest resistance while never
//! offering less than the minimum risk-reward ratio.
//!
//! References:
//! - Welles Wilder (1978): "New Concepts in Technical Trading Systems" (ATR)
//! - Van Tharp (2006): "Trade Your Way to Financial Freedom" (R-multiples)

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use tracing::debug;

use crate::config::TradeLevelConfig;
use crate::constants::{NO_ATR_STOP_DISTANCE, RESISTANCE_EXTENSION, RESISTANCE_TARGET_BUFFER};
use crate::errors::FusionError;
use crate::types::{Action, IndicatorSet, TradeLevels};

/// Trade-level calculator for long entries.
#[derive(Debug, Clone)]
pub struct TradeLevelCalculator {
    pub config: TradeLevelConfig,
}

impl TradeLevelCalculator {
    pub fn new(config: TradeLevelConfig) -> Self {
        Self { config }
    }

    /// Compute trade levels for a BUY at `current_price`.
    ///
    /// Prices are rounded to 2dp in the direction that preserves
    /// `stop_loss < ideal_entry < target`: entry to nearest, stop down,
    /// target up.
    ///
    /// # Errors
    /// - [`FusionError::UnsupportedAction`] for SELL or HOLD.
    /// - [`FusionError::InvalidInput`] for a non-positive price or when the
    ///   stop collapses onto the entry.
    pub fn calculate(
        &self,
        current_price: Decimal,
        indicators: &IndicatorSet,
        action: Action,
    ) -> Result<TradeLevels, FusionError> {
        if action != Action::Buy {
            return Err(FusionError::UnsupportedAction { action });
        }
        if current_price <= Decimal::ZERO {
            return Err(FusionError::InvalidInput {
                reason: format!("current price must be positive, got {current_price}"),
            });
        }

        let entry = self.ideal_entry(current_price, indicators);
        let stop = round_down(self.stop_loss(entry, indicators));

        let risk = entry - stop;
        if risk <= Decimal::ZERO {
            return Err(FusionError::InvalidInput {
                reason: format!("stop loss {stop} is not below entry {entry}"),
            });
        }

        let min_rr = self.config.min_risk_reward_ratio;
        let mut target = round_up(self.target(entry, risk, indicators));
        let mut rr = (target - entry) / risk;
        if rr < min_rr {
            target = round_up(entry + risk * min_rr);
            rr = (target - entry) / risk;
        }

        let levels = TradeLevels {
            ideal_entry: entry,
            stop_loss: stop,
            target,
            risk_per_trade_percent: self.config.risk_per_trade_percent,
            risk_reward_ratio: rr.round_dp_with_strategy(2, RoundingStrategy::ToZero),
            position_size_percent: round_nearest(self.position_size_percent(entry, risk)),
        };

        debug!(
            %current_price,
            entry = %levels.ideal_entry,
            stop = %levels.stop_loss,
            target = %levels.target,
            rr = %levels.risk_reward_ratio,
            size_pct = %levels.position_size_percent,
            "trade levels computed"
        );

        Ok(levels)
    }

    /// Just above the nearest support, else a fixed discount; never within
    /// 1% of the current price. Rounded to 2dp, with the cap rounded down so
    /// rounding cannot lift the entry back to the current price.
    fn ideal_entry(&self, current_price: Decimal, indicators: &IndicatorSet) -> Decimal {
        let entry = match indicators.nearest_support_below(current_price) {
            Some(support) => support * (dec!(1) + self.config.support_entry_buffer),
            None => current_price * (dec!(1) - self.config.fallback_entry_discount),
        };
        let cap = round_down(current_price * self.config.max_entry_ratio);
        round_nearest(entry).min(cap)
    }

    /// Tightest of the ATR stop and the support stop, floored at the maximum
    /// stop distance.
    fn stop_loss(&self, entry: Decimal, indicators: &IndicatorSet) -> Decimal {
        let atr_stop = if indicators.atr > Decimal::ZERO {
            entry - indicators.atr * self.config.atr_stop_multiplier
        } else {
            entry * (dec!(1) - NO_ATR_STOP_DISTANCE)
        };

        let mut stop = atr_stop;
        if let Some(support) = indicators.nearest_support_below(entry) {
            stop = stop.max(support * (dec!(1) - self.config.support_stop_buffer));
        }
        stop.max(entry * (dec!(1) - self.config.max_stop_distance))
    }

    fn target(&self, entry: Decimal, risk: Decimal, indicators: &IndicatorSet) -> Decimal {
        let base = entry + risk * self.config.min_risk_reward_ratio;
        match indicators.nearest_resistance_above(entry) {
            Some(r) if r > base => r * (dec!(1) - RESISTANCE_TARGET_BUFFER),
            Some(r) if r < base => base.max(r * (dec!(1) + RESISTANCE_EXTENSION)),
            _ => base,
        }
    }

    fn position_size_percent(&self, entry: Decimal, risk: Decimal) -> Decimal {
        let risk_pct = risk / entry * dec!(100);
        (self.config.risk_per_trade_percent / risk_pct).min(self.config.max_position_percent)
    }
}

fn round_nearest(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn round_down(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity)
}

fn round_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::ToPositiveInfinity)
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Regime};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn indicators(atr: Decimal, support: Vec<Decimal>, resistance: Vec<Decimal>) -> IndicatorSet {
        IndicatorSet {
            price: dec!(100),
            ma20: dec!(98),
            ma50: dec!(95),
            ma200: dec!(90),
            rsi: dec!(60),
            macd: dec!(1),
            macd_signal: dec!(0.5),
            atr,
            support_levels: support,
            resistance_levels: resistance,
            technical_score: dec!(0.5),
            regime: Regime::BullishTrend,
            direction: Direction::Bullish,
            strength: dec!(0.5),
            confidence: dec!(0.88),
        }
    }

    fn calculator() -> TradeLevelCalculator {
        TradeLevelCalculator::new(TradeLevelConfig::default())
    }

    #[test]
    fn test_fallback_entry_targets_resistance() {
        let set = indicators(dec!(2), vec![], vec![dec!(110)]);
        let levels = calculator().calculate(dec!(100), &set, Action::Buy).unwrap();

        assert_eq!(levels.ideal_entry, dec!(98));
        assert_eq!(levels.stop_loss, dec!(95));
        assert_eq!(levels.target, d("109.45"));
        assert_eq!(levels.risk_reward_ratio, d("3.81"));
        assert_eq!(levels.position_size_percent, d("0.49"));
        assert_eq!(levels.risk_per_trade_percent, d("1.5"));
    }

    #[test]
    fn test_support_entry_and_support_stop() {
        let set = indicators(dec!(2), vec![dec!(90)], vec![dec!(110)]);
        let levels = calculator().calculate(dec!(100), &set, Action::Buy).unwrap();

        // 90 × 1.005 = 90.45; support stop 90 × 0.995 beats the ATR stop 87.45.
        assert_eq!(levels.ideal_entry, d("90.45"));
        assert_eq!(levels.stop_loss, d("89.55"));
        assert_eq!(levels.target, d("109.45"));
        assert_eq!(levels.position_size_percent, d("1.51"));
    }

    #[test]
    fn test_entry_capped_below_price() {
        // Support right under the price would put entry above 99% of it.
        let set = indicators(dec!(2), vec![d("99.8")], vec![]);
        let levels = calculator().calculate(dec!(100), &set, Action::Buy).unwrap();
        assert_eq!(levels.ideal_entry, dec!(99));
    }

    #[test]
    fn test_sub_unit_entry_stays_below_price() {
        // Cap 0.495 would round up to the price itself.
        let set = indicators(Decimal::ZERO, vec![d("0.4999")], vec![]);
        let levels = calculator().calculate(d("0.50"), &set, Action::Buy).unwrap();
        assert_eq!(levels.ideal_entry, d("0.49"));
        // 0.49 × 0.95 = 0.4655, rounded down.
        assert_eq!(levels.stop_loss, d("0.46"));
        assert!(levels.target > levels.ideal_entry);
    }

    #[test]
    fn test_entry_below_price_for_small_prices() {
        for cents in 10..200u32 {
            let price = Decimal::new(i64::from(cents), 2);
            let set = indicators(Decimal::ZERO, vec![price * d("0.9999")], vec![]);
            if let Ok(l) = calculator().calculate(price, &set, Action::Buy) {
                assert!(l.ideal_entry < price, "price {price}: {l:?}");
                assert!(l.stop_loss < l.ideal_entry && l.ideal_entry < l.target, "{l:?}");
            }
        }
    }

    #[test]
    fn test_stop_floored_at_max_distance() {
        // 1.5 × ATR 20 = 30 below entry; the 8% floor wins.
        let set = indicators(dec!(20), vec![], vec![]);
        let levels = calculator().calculate(dec!(100), &set, Action::Buy).unwrap();
        assert_eq!(levels.stop_loss, d("90.16"));
        assert_eq!(levels.position_size_percent, d("0.19"));
    }

    #[test]
    fn test_zero_atr_uses_fixed_stop() {
        let set = indicators(Decimal::ZERO, vec![], vec![]);
        let levels = calculator().calculate(dec!(100), &set, Action::Buy).unwrap();
        assert_eq!(levels.stop_loss, d("93.1"));
        assert_eq!(levels.target, d("107.8"));
        assert_eq!(levels.risk_reward_ratio, dec!(2));
    }

    #[test]
    fn test_near_resistance_extends_target() {
        // Resistance at 100 sits below the 2R target of 104.
        let set = indicators(dec!(2), vec![], vec![dec!(100)]);
        let levels = calculator().calculate(dec!(100), &set, Action::Buy).unwrap();
        assert_eq!(levels.target, dec!(104));
        assert_eq!(levels.risk_reward_ratio, dec!(2));
    }

    #[test]
    fn test_resistance_just_below_target_is_extended() {
        // 2R target 104, resistance 103 → 103 × 1.02 = 105.06.
        let set = indicators(dec!(2), vec![], vec![dec!(103)]);
        let levels = calculator().calculate(dec!(100), &set, Action::Buy).unwrap();
        assert_eq!(levels.target, d("105.06"));
        assert_eq!(levels.risk_reward_ratio, d("2.35"));
    }

    #[test]
    fn test_invariants_hold_across_inputs() {
        let prices = [d("12.37"), dec!(100), d("523.19"), d("2718.28")];
        let atrs = [Decimal::ZERO, d("0.3"), dec!(5), dec!(80)];
        for &price in &prices {
            for &atr in &atrs {
                let set = indicators(
                    atr,
                    vec![price * d("0.9"), price * d("0.97")],
                    vec![price * d("1.05"), price * d("1.3")],
                );
                let l = calculator().calculate(price, &set, Action::Buy).unwrap();
                assert!(l.stop_loss < l.ideal_entry && l.ideal_entry < l.target, "{l:?}");
                assert!(l.risk_reward_ratio >= dec!(2), "{l:?}");
                assert!(l.position_size_percent > Decimal::ZERO);
                assert!(l.position_size_percent <= dec!(10));
                assert!(l.risk_per_trade_percent <= d("1.5"));
            }
        }
    }

    #[test]
    fn test_rejects_non_buy() {
        let set = indicators(dec!(2), vec![], vec![]);
        for action in [Action::Sell, Action::Hold] {
            let err = calculator().calculate(dec!(100), &set, action).unwrap_err();
            assert!(matches!(err, FusionError::UnsupportedAction { .. }));
        }
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let set = indicators(dec!(2), vec![], vec![]);
        let err = calculator().calculate(Decimal::ZERO, &set, Action::Buy).unwrap_err();
        assert!(matches!(err, FusionError::InvalidInput { .. }));
    }

    #[test]
    fn test_degenerate_risk_is_invalid() {
        // Entry and stop both round to zero.
        let set = indicators(Decimal::ZERO, vec![], vec![]);
        let err = calculator().calculate(d("0.004"), &set, Action::Buy).unwrap_err();
        assert!(matches!(err, FusionError::InvalidInput { .. }));
    }
}
