//! Pure computation module for price-action indicators and regime detection.
//!
//! No I/O, no side effects. Takes a chronological price history and returns
//! indicator values. All computations use `Decimal`; the MACD score's `tanh`
//! is evaluated in `f64` and converted back at the boundary.
//!
//! Indicators implemented:
//! - Trend: SMA (20/50/200 with fallback), EMA, MACD (12/26/9)
//! - Momentum: RSI (Wilder's smoothing)
//! - Range: ATR (rolling mean of true range)
//! - Structure: support/resistance from clustered local extrema
//! - Composite: regime label, technical score, direction/strength/confidence
//!
//! Primitives return a neutral fallback on short input. Only [`analyze`]
//! refuses to run, because a full indicator set computed from too little
//! history would be misleading.
//!
//! References:
//!     Wilder (1978), "New Concepts in Technical Trading Systems".
//!     Appel (2005), "Technical Analysis: Power Tools for Active Investors".

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::config::IndicatorParams;
use crate::constants::*;
use crate::errors::FusionError;
use crate::types::{validate_history, Direction, IndicatorSet, PricePoint, Regime};

// ═══════════════════════════════════════════════════════════════════════════
// Moving Averages & Oscillators
// ═══════════════════════════════════════════════════════════════════════════

/// Simple moving average over the trailing `period` values.
///
/// Returns `None` if insufficient data.
pub fn sma(values: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().copied().sum::<Decimal>() / Decimal::from(period as u64))
}

/// Exponential Moving Average.
///
/// Multiplier `k = 2 / (period + 1)`. First value seeded with SMA of the
/// first `period` values. Returns empty `Vec` if insufficient data.
pub fn ema(values: &[Decimal], period: usize) -> Vec<Decimal> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = dec!(2) / Decimal::from(period as u64 + 1);
    let one_minus_k = dec!(1) - k;

    let mut prev = values[..period].iter().copied().sum::<Decimal>() / Decimal::from(period as u64);
    let mut result = Vec::with_capacity(values.len() - period + 1);
    result.push(prev);

    for &value in &values[period..] {
        prev = value * k + prev * one_minus_k;
        result.push(prev);
    }

    result
}

/// Relative Strength Index (Wilder's smoothing).
///
/// Uses smoothing factor `1/period`. Returns 50 if insufficient data and
/// 100 when there were no losses.
pub fn rsi(closes: &[Decimal], period: usize) -> Decimal {
    if period == 0 || closes.len() < period + 1 {
        return RSI_MIDLINE;
    }

    let period_d = Decimal::from(period as u64);
    let period_m1 = Decimal::from(period as u64 - 1);

    let changes: Vec<Decimal> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period]
        .iter()
        .map(|&c| c.max(Decimal::ZERO))
        .sum::<Decimal>()
        / period_d;
    let mut avg_loss = changes[..period]
        .iter()
        .map(|&c| (-c).max(Decimal::ZERO))
        .sum::<Decimal>()
        / period_d;

    for &c in &changes[period..] {
        avg_gain = (avg_gain * period_m1 + c.max(Decimal::ZERO)) / period_d;
        avg_loss = (avg_loss * period_m1 + (-c).max(Decimal::ZERO)) / period_d;
    }

    if avg_loss == Decimal::ZERO {
        return dec!(100);
    }

    let rs = avg_gain / avg_loss;
    (dec!(100) - dec!(100) / (dec!(1) + rs)).clamp(Decimal::ZERO, dec!(100))
}

/// Moving Average Convergence Divergence.
///
/// Returns `(macd_line, signal_line)`. Needs `slow + signal` points,
/// otherwise returns `(0, 0)`.
pub fn macd(closes: &[Decimal], fast: usize, slow: usize, signal: usize) -> (Decimal, Decimal) {
    if fast == 0 || fast >= slow || closes.len() < slow + signal {
        return (Decimal::ZERO, Decimal::ZERO);
    }

    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);

    // Align: MACD line = fast_ema - slow_ema, from the slow-start onward.
    let offset = slow - fast;
    let macd_values: Vec<Decimal> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, &slow_val)| fast_ema[i + offset] - slow_val)
        .collect();

    let signal_ema = ema(&macd_values, signal);
    match (macd_values.last(), signal_ema.last()) {
        (Some(&line), Some(&sig)) => (line, sig),
        _ => (Decimal::ZERO, Decimal::ZERO),
    }
}

/// Average True Range as the simple mean of the last `period` true ranges.
///
/// `TR = max(H-L, |H-prevC|, |L-prevC|)`. Returns `Decimal::ZERO` on
/// mismatched or insufficient data.
pub fn atr(highs: &[Decimal], lows: &[Decimal], closes: &[Decimal], period: usize) -> Decimal {
    let n = highs.len();
    if period == 0 || n < period + 1 || lows.len() != n || closes.len() != n {
        return Decimal::ZERO;
    }

    let total: Decimal = (n - period..n)
        .map(|i| {
            let hl = highs[i] - lows[i];
            let hc = (highs[i] - closes[i - 1]).abs();
            let lc = (lows[i] - closes[i - 1]).abs();
            hl.max(hc).max(lc)
        })
        .sum();

    total / Decimal::from(period as u64)
}

/// Short, medium and long simple moving averages.
///
/// The medium average falls back to the short one, and the long to the
/// medium, when the history is too short for their windows.
pub fn moving_averages(
    closes: &[Decimal],
    params: &IndicatorParams,
) -> (Decimal, Decimal, Decimal) {
    let last = closes.last().copied().unwrap_or(Decimal::ZERO);
    let short = sma(closes, params.ma_short).unwrap_or(last);
    let medium = sma(closes, params.ma_medium).unwrap_or(short);
    let long = sma(closes, params.ma_long).unwrap_or(medium);
    (short, medium, long)
}

// ═══════════════════════════════════════════════════════════════════════════
// Support & Resistance
// ═══════════════════════════════════════════════════════════════════════════

/// Support and resistance levels from local extrema of lows and highs.
///
/// The look-around window is `max(sr_min_order, len / 20)` points on each
/// side, clipped at the series edges. Candidate levels are clustered in
/// chronological order, sorted ascending, and the top `sr_max_levels` kept.
/// Returns two empty vectors with fewer than 20 points.
pub fn support_resistance(
    points: &[PricePoint],
    params: &IndicatorParams,
) -> (Vec<Decimal>, Vec<Decimal>) {
    if points.len() < SR_MIN_HISTORY {
        return (Vec::new(), Vec::new());
    }

    let order = params.sr_min_order.max(points.len() / SR_ORDER_DIVISOR);
    let lows: Vec<Decimal> = points.iter().map(|p| p.low).collect();
    let highs: Vec<Decimal> = points.iter().map(|p| p.high).collect();

    let supports = local_extrema(&lows, order, |cur, other| cur <= other);
    let resistances = local_extrema(&highs, order, |cur, other| cur >= other);

    (
        reduce_levels(&supports, params),
        reduce_levels(&resistances, params),
    )
}

/// Values at indices that satisfy `keep(value, neighbour)` against every
/// neighbour within `order` on both sides.
fn local_extrema(
    series: &[Decimal],
    order: usize,
    keep: impl Fn(Decimal, Decimal) -> bool,
) -> Vec<Decimal> {
    let Some(last) = series.len().checked_sub(1) else {
        return Vec::new();
    };

    series
        .iter()
        .enumerate()
        .filter(|&(i, &value)| {
            (1..=order).all(|k| {
                let left = series[i.saturating_sub(k)];
                let right = series[(i + k).min(last)];
                keep(value, left) && keep(value, right)
            })
        })
        .map(|(_, &value)| value)
        .collect()
}

fn reduce_levels(levels: &[Decimal], params: &IndicatorParams) -> Vec<Decimal> {
    let mut clustered = cluster_levels(levels, params.sr_cluster_tolerance);
    clustered.sort();
    let start = clustered.len().saturating_sub(params.sr_max_levels);
    clustered.split_off(start)
}

/// Merge consecutive levels within `tolerance` (fractional) of the running
/// cluster average. Each cluster collapses to its mean.
pub fn cluster_levels(levels: &[Decimal], tolerance: Decimal) -> Vec<Decimal> {
    let Some((&first, rest)) = levels.split_first() else {
        return Vec::new();
    };

    let mut clustered = Vec::new();
    let mut sum = first;
    let mut count = 1u64;

    for &level in rest {
        let avg = sum / Decimal::from(count);
        let joins = if avg.is_zero() {
            level.is_zero()
        } else {
            (level - avg).abs() / avg <= tolerance
        };

        if joins {
            sum += level;
            count += 1;
        } else {
            clustered.push(avg);
            sum = level;
            count = 1;
        }
    }
    clustered.push(sum / Decimal::from(count));

    clustered
}

// ═══════════════════════════════════════════════════════════════════════════
// Regime & Scoring
// ═══════════════════════════════════════════════════════════════════════════

/// Classify the price/momentum regime. First match wins:
/// oversold → overbought → strict trend → relaxed trend → consolidation.
pub fn classify_regime(
    price: Decimal,
    ma20: Decimal,
    ma50: Decimal,
    ma200: Decimal,
    rsi: Decimal,
    macd: Decimal,
) -> Regime {
    if rsi < RSI_OVERSOLD_ZONE && macd < Decimal::ZERO && price < ma20 {
        return Regime::OversoldZone;
    }
    if rsi > RSI_OVERBOUGHT_ZONE && macd > Decimal::ZERO && price > ma20 {
        return Regime::OverboughtZone;
    }

    let bullish_stack = price > ma20 && ma20 > ma50 && ma50 > ma200;
    if bullish_stack && macd > Decimal::ZERO && (RSI_MIDLINE..=RSI_OVERBOUGHT).contains(&rsi) {
        return Regime::BullishTrend;
    }

    let bearish_stack = price < ma20 && ma20 < ma50 && ma50 < ma200;
    if bearish_stack && macd < Decimal::ZERO && (RSI_OVERSOLD..=RSI_MIDLINE).contains(&rsi) {
        return Regime::BearishTrend;
    }

    if price > ma20 && macd > Decimal::ZERO {
        return Regime::BullishTrend;
    }
    if price < ma20 && macd < Decimal::ZERO {
        return Regime::BearishTrend;
    }

    Regime::Consolidation
}

/// Moving-average alignment score in [-1, 1].
pub fn ma_score(ma20: Decimal, ma50: Decimal, ma200: Decimal) -> Decimal {
    let mut score = Decimal::ZERO;
    score += if ma20 > ma50 { MA_PAIR_SCORE } else { -MA_PAIR_SCORE };
    score += if ma50 > ma200 { MA_PAIR_SCORE } else { -MA_PAIR_SCORE };

    if ma20 > ma50 && ma50 > ma200 {
        score += MA_ALIGNMENT_SCORE;
    } else if ma20 < ma50 && ma50 < ma200 {
        score -= MA_ALIGNMENT_SCORE;
    }
    score
}

/// RSI contribution: linear penalty outside [30, 70], small bias inside.
pub fn rsi_score(rsi: Decimal) -> Decimal {
    if rsi > RSI_OVERBOUGHT {
        -(rsi - RSI_OVERBOUGHT) / dec!(30)
    } else if rsi < RSI_OVERSOLD {
        (RSI_OVERSOLD - rsi) / dec!(30)
    } else {
        (rsi - RSI_MIDLINE) / dec!(100)
    }
}

/// `tanh((macd - signal) / 2)`.
pub fn macd_score(macd: Decimal, signal: Decimal) -> Decimal {
    let diff = (macd - signal).to_f64().unwrap_or(0.0);
    Decimal::from_f64((diff / MACD_SCORE_SCALE).tanh()).unwrap_or(Decimal::ZERO)
}

/// Weighted technical score, clamped to [-1, 1].
pub fn technical_score(
    ma20: Decimal,
    ma50: Decimal,
    ma200: Decimal,
    rsi: Decimal,
    macd: Decimal,
    macd_signal: Decimal,
) -> Decimal {
    let score = ma_score(ma20, ma50, ma200) * TECH_MA_WEIGHT
        + rsi_score(rsi) * TECH_RSI_WEIGHT
        + macd_score(macd, macd_signal) * TECH_MACD_WEIGHT;
    score.clamp(dec!(-1), dec!(1))
}

/// Direction and strength in [0, 1] from regime and score.
///
/// Exhaustion zones keep the direction of the move that stretched them at a
/// 0.7x discount; consolidation and weak scores are neutral at 0.3x.
pub fn direction_and_strength(regime: Regime, score: Decimal) -> (Direction, Decimal) {
    let regime_multiplier = match regime {
        Regime::BullishTrend | Regime::BearishTrend => dec!(1.0),
        Regime::OversoldZone | Regime::OverboughtZone => dec!(0.8),
        Regime::Consolidation | Regime::Neutral => dec!(0.5),
    };
    let base = score.abs() * regime_multiplier;

    let (direction, strength) = match regime {
        Regime::OversoldZone => (Direction::Bearish, base * dec!(0.7)),
        Regime::OverboughtZone => (Direction::Bullish, base * dec!(0.7)),
        Regime::Consolidation => (Direction::Neutral, base * dec!(0.3)),
        _ if score > DIRECTIONAL_BAND => (Direction::Bullish, base),
        _ if score < -DIRECTIONAL_BAND => (Direction::Bearish, base),
        _ => (Direction::Neutral, base * dec!(0.3)),
    };

    (direction, strength.clamp(Decimal::ZERO, dec!(1)))
}

/// Confidence from score magnitude, boosted for clear regimes.
pub fn technical_confidence(regime: Regime, score: Decimal) -> Decimal {
    let magnitude = score.abs();
    let base = if magnitude < DIRECTIONAL_BAND {
        dec!(0.5)
    } else if magnitude > STRONG_SIGNAL {
        dec!(0.95)
    } else {
        dec!(0.8)
    };

    let boosted = if regime.is_trend() {
        base * dec!(1.1)
    } else if regime.is_exhaustion() {
        base * dec!(1.05)
    } else {
        base
    };
    boosted.min(dec!(1))
}

// ═══════════════════════════════════════════════════════════════════════════
// Composite
// ═══════════════════════════════════════════════════════════════════════════

/// Compute the full [`IndicatorSet`] for a chronological price history.
///
/// Fails with [`FusionError::InsufficientData`] below
/// [`IndicatorParams::required_history`] and with
/// [`FusionError::InvalidPricePoint`] on a malformed bar.
pub fn analyze(
    points: &[PricePoint],
    params: &IndicatorParams,
) -> Result<IndicatorSet, FusionError> {
    let required = params.required_history();
    if points.len() < required {
        return Err(FusionError::InsufficientData {
            indicator: "analysis",
            required,
            available: points.len(),
        });
    }
    validate_history(points)?;

    let closes: Vec<Decimal> = points.iter().map(|p| p.close).collect();
    let highs: Vec<Decimal> = points.iter().map(|p| p.high).collect();
    let lows: Vec<Decimal> = points.iter().map(|p| p.low).collect();

    let price = closes.last().copied().unwrap_or(Decimal::ZERO);
    let (ma20, ma50, ma200) = moving_averages(&closes, params);
    let rsi_val = rsi(&closes, params.rsi_period);
    let (macd_line, macd_sig) =
        macd(&closes, params.macd_fast, params.macd_slow, params.macd_signal);
    let atr_val = atr(&highs, &lows, &closes, params.atr_period);
    let (support_levels, resistance_levels) = support_resistance(points, params);

    let regime = classify_regime(price, ma20, ma50, ma200, rsi_val, macd_line);
    let score = technical_score(ma20, ma50, ma200, rsi_val, macd_line, macd_sig);
    let (direction, strength) = direction_and_strength(regime, score);
    let confidence = technical_confidence(regime, score);

    debug!(
        points = points.len(),
        %price,
        %rsi_val,
        %macd_line,
        %score,
        %regime,
        %direction,
        "indicators computed"
    );

    Ok(IndicatorSet {
        price,
        ma20,
        ma50,
        ma200,
        rsi: rsi_val,
        macd: macd_line,
        macd_signal: macd_sig,
        atr: atr_val,
        support_levels,
        resistance_levels,
        technical_score: score,
        regime,
        direction,
        strength,
        confidence,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
