use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{SignalFusionConfig, WeightTriple};

/// Tolerance on weight sums.
const WEIGHT_SUM_TOLERANCE: Decimal = dec!(0.001);

/// Validate invariants across the merged config that serde alone cannot enforce.
///
/// Every violation is collected so a single run reports all of them. Called
/// automatically by [`super::load_config`].
pub fn validate_config(config: &SignalFusionConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_logging_config(config, &mut errors);
    validate_indicator_params(config, &mut errors);
    validate_market_context_config(config, &mut errors);
    validate_fusion_config(config, &mut errors);
    validate_trade_level_config(config, &mut errors);
    validate_gating_config(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = format!(
            "Configuration validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
        bail!("{msg}");
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn validate_logging_config(config: &SignalFusionConfig, errors: &mut Vec<String>) {
    let logging = &config.app.logging;
    if logging.log_dir.trim().is_empty() {
        errors.push("app.logging.log_dir must not be empty".into());
    }
    if logging.file_name.trim().is_empty() {
        errors.push("app.logging.file_name must not be empty".into());
    }
}

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

fn validate_indicator_params(config: &SignalFusionConfig, errors: &mut Vec<String>) {
    let ind = &config.indicators;

    let periods = [
        ("ma_short", ind.ma_short),
        ("ma_medium", ind.ma_medium),
        ("ma_long", ind.ma_long),
        ("rsi_period", ind.rsi_period),
        ("macd_fast", ind.macd_fast),
        ("macd_slow", ind.macd_slow),
        ("macd_signal", ind.macd_signal),
        ("atr_period", ind.atr_period),
        ("sr_min_order", ind.sr_min_order),
        ("sr_max_levels", ind.sr_max_levels),
    ];
    for (name, value) in periods {
        if value == 0 {
            errors.push(format!("indicators: {name} must be > 0"));
        }
    }

    if !(ind.ma_short < ind.ma_medium && ind.ma_medium < ind.ma_long) {
        errors.push(format!(
            "indicators: moving average periods must increase (got {}/{}/{})",
            ind.ma_short, ind.ma_medium, ind.ma_long
        ));
    }

    if ind.macd_fast >= ind.macd_slow {
        errors.push(format!(
            "indicators: macd_fast ({}) must be < macd_slow ({})",
            ind.macd_fast, ind.macd_slow
        ));
    }

    let macd_min = ind.macd_slow + ind.macd_signal;
    if ind.min_history < macd_min {
        errors.push(format!(
            "indicators: min_history ({}) must be >= macd_slow + macd_signal ({macd_min})",
            ind.min_history
        ));
    }

    if ind.sr_cluster_tolerance <= Decimal::ZERO || ind.sr_cluster_tolerance >= dec!(1) {
        errors.push(format!(
            "indicators: sr_cluster_tolerance ({}) must be in (0, 1)",
            ind.sr_cluster_tolerance
        ));
    }
}

// ---------------------------------------------------------------------------
// Market context
// ---------------------------------------------------------------------------

fn validate_market_context_config(config: &SignalFusionConfig, errors: &mut Vec<String>) {
    let mc = &config.market_context;

    if !(mc.vix_low_threshold < mc.vix_moderate_threshold
        && mc.vix_moderate_threshold < mc.vix_high_threshold)
    {
        errors.push(format!(
            "market_context: VIX thresholds must be strictly increasing (got {}/{}/{})",
            mc.vix_low_threshold, mc.vix_moderate_threshold, mc.vix_high_threshold
        ));
    }

    if mc.vix_fallback <= Decimal::ZERO {
        errors.push(format!(
            "market_context: vix_fallback ({}) must be > 0",
            mc.vix_fallback
        ));
    }

    if mc.volume_confirmation_score < Decimal::ZERO || mc.volume_confirmation_score > dec!(1) {
        errors.push(format!(
            "market_context: volume_confirmation_score ({}) must be in [0, 1]",
            mc.volume_confirmation_score
        ));
    }

    if mc.ma_short == 0 || mc.ma_short >= mc.ma_medium {
        errors.push(format!(
            "market_context: ma_short ({}) must be > 0 and < ma_medium ({})",
            mc.ma_short, mc.ma_medium
        ));
    }
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

fn validate_fusion_config(config: &SignalFusionConfig, errors: &mut Vec<String>) {
    let fusion = &config.fusion;

    if let Err(e) = validate_static_weights(&fusion.static_weights) {
        errors.push(format!("fusion.static_weights: {e}"));
    }

    for (state, weights) in &fusion.weight_table {
        let total = weights.total();
        if (total - dec!(1)).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(format!(
                "fusion.weight_table.{state}: weights must sum to 1.0 (got {total})"
            ));
        }
        if weights.sentiment < Decimal::ZERO
            || weights.technical < Decimal::ZERO
            || weights.fundamental < Decimal::ZERO
        {
            errors.push(format!(
                "fusion.weight_table.{state}: weights must be non-negative"
            ));
        }
    }

    if fusion.buy_threshold <= Decimal::ZERO {
        errors.push(format!(
            "fusion: buy_threshold ({}) must be > 0",
            fusion.buy_threshold
        ));
    }
    if fusion.sell_threshold >= Decimal::ZERO {
        errors.push(format!(
            "fusion: sell_threshold ({}) must be < 0",
            fusion.sell_threshold
        ));
    }
}

/// Static weights are normalised at use, so only the sign and total matter.
fn validate_static_weights(weights: &WeightTriple) -> Result<(), String> {
    if weights.sentiment < Decimal::ZERO
        || weights.technical < Decimal::ZERO
        || weights.fundamental < Decimal::ZERO
    {
        return Err("weights must be non-negative".into());
    }
    if weights.total() <= Decimal::ZERO {
        return Err("weights must have a positive total".into());
    }
    Ok(())
}

fn validate_trade_level_config(config: &SignalFusionConfig, errors: &mut Vec<String>) {
    let tl = &config.fusion.trade_levels;

    if tl.risk_per_trade_percent <= Decimal::ZERO || tl.risk_per_trade_percent > dec!(1.5) {
        errors.push(format!(
            "fusion.trade_levels: risk_per_trade_percent ({}) must be in (0, 1.5]",
            tl.risk_per_trade_percent
        ));
    }

    if tl.max_position_percent <= Decimal::ZERO || tl.max_position_percent > dec!(10) {
        errors.push(format!(
            "fusion.trade_levels: max_position_percent ({}) must be in (0, 10]",
            tl.max_position_percent
        ));
    }

    if tl.min_risk_reward_ratio < dec!(2) {
        errors.push(format!(
            "fusion.trade_levels: min_risk_reward_ratio ({}) must be >= 2.0",
            tl.min_risk_reward_ratio
        ));
    }

    if tl.max_stop_distance <= Decimal::ZERO || tl.max_stop_distance >= dec!(1) {
        errors.push(format!(
            "fusion.trade_levels: max_stop_distance ({}) must be in (0, 1)",
            tl.max_stop_distance
        ));
    }

    if tl.max_entry_ratio <= Decimal::ZERO || tl.max_entry_ratio > dec!(1) {
        errors.push(format!(
            "fusion.trade_levels: max_entry_ratio ({}) must be in (0, 1]",
            tl.max_entry_ratio
        ));
    }

    if tl.atr_stop_multiplier <= Decimal::ZERO {
        errors.push(format!(
            "fusion.trade_levels: atr_stop_multiplier ({}) must be > 0",
            tl.atr_stop_multiplier
        ));
    }
}

// ---------------------------------------------------------------------------
// Gating
// ---------------------------------------------------------------------------

fn validate_gating_config(config: &SignalFusionConfig, errors: &mut Vec<String>) {
    let nt = &config.gating.no_trade;
    if nt.vix_spike_threshold <= Decimal::ZERO {
        errors.push(format!(
            "gating.no_trade: vix_spike_threshold ({}) must be > 0",
            nt.vix_spike_threshold
        ));
    }
    if nt.nifty_drop_threshold <= Decimal::ZERO || nt.nifty_drop_threshold >= dec!(1) {
        errors.push(format!(
            "gating.no_trade: nifty_drop_threshold ({}) must be in (0, 1)",
            nt.nifty_drop_threshold
        ));
    }

    let rw = &config.gating.reversal_watch;
    if rw.volume_lookback == 0 {
        errors.push("gating.reversal_watch: volume_lookback must be > 0".into());
    }
    if rw.volume_spike_ratio <= dec!(1) {
        errors.push(format!(
            "gating.reversal_watch: volume_spike_ratio ({}) must be > 1.0",
            rw.volume_spike_ratio
        ));
    }
    if rw.volatile_panic_vix > rw.panic_vix {
        errors.push(format!(
            "gating.reversal_watch: volatile_panic_vix ({}) must be <= panic_vix ({})",
            rw.volatile_panic_vix, rw.panic_vix
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketState;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&SignalFusionConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_multiple_errors() {
        let mut config = SignalFusionConfig::default();
        config.indicators.macd_fast = 30;
        config.fusion.sell_threshold = dec!(0.1);
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("2 errors"), "got: {err}");
        assert!(err.contains("macd_fast"));
        assert!(err.contains("sell_threshold"));
    }

    #[test]
    fn test_empty_log_file_name_rejected() {
        let mut config = SignalFusionConfig::default();
        config.app.logging.file_name = " ".into();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("app.logging.file_name"), "got: {err}");
    }

    #[test]
    fn test_weight_table_must_sum_to_one() {
        let mut config = SignalFusionConfig::default();
        config.fusion.weight_table.insert(
            MarketState::Bullish,
            WeightTriple::new(dec!(0.5), dec!(0.5), dec!(0.5)),
        );
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("weight_table.bullish"), "got: {err}");
    }

    #[test]
    fn test_zero_static_weights_rejected() {
        let mut config = SignalFusionConfig::default();
        config.fusion.static_weights =
            WeightTriple::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("positive total"));
    }

    #[test]
    fn test_vix_thresholds_must_increase() {
        let mut config = SignalFusionConfig::default();
        config.market_context.vix_moderate_threshold = dec!(30);
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("strictly increasing"));
    }

    #[test]
    fn test_min_history_below_macd_requirement() {
        let mut config = SignalFusionConfig::default();
        config.indicators.min_history = 30;
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("min_history"));
    }

    #[test]
    fn test_min_risk_reward_below_two_rejected() {
        let mut config = SignalFusionConfig::default();
        config.fusion.trade_levels.min_risk_reward_ratio = dec!(1.0);
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("min_risk_reward_ratio (1.0) must be >= 2.0"), "got: {err}");

        config.fusion.trade_levels.min_risk_reward_ratio = dec!(2);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_max_position_percent_bounds() {
        let mut config = SignalFusionConfig::default();
        config.fusion.trade_levels.max_position_percent = dec!(50);
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("max_position_percent (50) must be in (0, 10]"), "got: {err}");

        config.fusion.trade_levels.max_position_percent = Decimal::ZERO;
        assert!(validate_config(&config).is_err());

        config.fusion.trade_levels.max_position_percent = dec!(10);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_risk_per_trade_capped() {
        let mut config = SignalFusionConfig::default();
        config.fusion.trade_levels.risk_per_trade_percent = dec!(2.0);
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("risk_per_trade_percent"));
    }
}
