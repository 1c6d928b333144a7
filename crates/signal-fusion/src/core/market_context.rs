//! Broad-market context: index trends, volatility bucket, market state,
//! signal quality and favorability.
//!
//! The computation is pure and fail-open: a missing index or VIX series
//! degrades to neutral/fallback values instead of an error. The provider
//! wraps it in a single-entry TTL cache shared by every caller.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::config::MarketContextConfig;
use crate::constants::SIGNAL_QUALITY_FULL_DISTANCE;
use crate::core::indicators::sma;
use crate::core::now_unix;
use crate::types::{Direction, MarketContext, MarketHistories, MarketState, PricePoint, VixLevel};

// ═══════════════════════════════════════════════════════════════════════════
// Index snapshot & classification
// ═══════════════════════════════════════════════════════════════════════════

/// Last close of an index with its short and medium moving averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    pub price: Decimal,
    pub ma20: Decimal,
    pub ma50: Decimal,
}

impl IndexSnapshot {
    fn has_zero(&self) -> bool {
        self.price.is_zero() || self.ma20.is_zero() || self.ma50.is_zero()
    }
}

/// Snapshot an index history. Averages fall back to shorter windows, then to
/// the price itself; a missing or empty history is all zeros.
pub fn index_snapshot(
    history: Option<&[PricePoint]>,
    config: &MarketContextConfig,
) -> IndexSnapshot {
    let Some(last) = history.and_then(|h| h.last()) else {
        return IndexSnapshot::default();
    };
    let closes: Vec<Decimal> = history.unwrap_or_default().iter().map(|p| p.close).collect();

    let price = last.close;
    let ma20 = sma(&closes, config.ma_short).unwrap_or(price);
    let ma50 = sma(&closes, config.ma_medium).unwrap_or(ma20);

    IndexSnapshot { price, ma20, ma50 }
}

/// Trend of one index relative to both of its averages.
pub fn classify_trend(snapshot: &IndexSnapshot) -> Direction {
    if snapshot.has_zero() {
        return Direction::Neutral;
    }
    if snapshot.price > snapshot.ma20 && snapshot.price > snapshot.ma50 {
        Direction::Bullish
    } else if snapshot.price < snapshot.ma20 && snapshot.price < snapshot.ma50 {
        Direction::Bearish
    } else {
        Direction::Neutral
    }
}

pub fn classify_vix(value: Decimal, config: &MarketContextConfig) -> VixLevel {
    if value < config.vix_low_threshold {
        VixLevel::Low
    } else if value < config.vix_moderate_threshold {
        VixLevel::Moderate
    } else if value < config.vix_high_threshold {
        VixLevel::High
    } else {
        VixLevel::VeryHigh
    }
}

/// Elevated volatility overrides the index trends.
pub fn determine_market_state(
    nifty: Direction,
    bank_nifty: Direction,
    vix: VixLevel,
) -> MarketState {
    if vix.is_elevated() {
        return MarketState::Volatile;
    }
    match (nifty, bank_nifty) {
        (Direction::Bullish, Direction::Bullish) => MarketState::Bullish,
        (Direction::Bearish, Direction::Bearish) => MarketState::Bearish,
        _ => MarketState::Neutral,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Quality & favorability
// ═══════════════════════════════════════════════════════════════════════════

/// How much to trust the market read, in [0, 1].
///
/// 40% distance of the broad index from its averages, 20% volume
/// confirmation, 40% agreement between the two indices.
pub fn signal_quality(
    nifty: &IndexSnapshot,
    nifty_trend: Direction,
    bank_nifty_trend: Direction,
    volume_score: Decimal,
) -> Decimal {
    let distance = if nifty.has_zero() {
        dec!(0.5)
    } else {
        let d20 = (nifty.price - nifty.ma20).abs() / nifty.ma20;
        let d50 = (nifty.price - nifty.ma50).abs() / nifty.ma50;
        ((d20 + d50) / dec!(2) / SIGNAL_QUALITY_FULL_DISTANCE).min(dec!(1))
    };

    let consistency = match (nifty_trend, bank_nifty_trend) {
        (Direction::Neutral, Direction::Neutral) => dec!(0.6),
        (a, b) if a == b => dec!(1.0),
        _ => dec!(0.3),
    };

    (distance * dec!(0.4) + volume_score * dec!(0.2) + consistency * dec!(0.4))
        .clamp(Decimal::ZERO, dec!(1))
}

/// How hospitable the market is to new long entries, in [0, 1].
pub fn favorability(
    state: MarketState,
    vix: VixLevel,
    nifty_trend: Direction,
    bank_nifty_trend: Direction,
) -> Decimal {
    let state_score = match state {
        MarketState::Bullish => dec!(0.85),
        MarketState::Neutral => dec!(0.55),
        MarketState::Bearish => dec!(0.30),
        MarketState::Volatile => dec!(0.35),
    };
    let vix_score = match vix {
        VixLevel::Low => dec!(0.9),
        VixLevel::Moderate => dec!(0.7),
        VixLevel::High => dec!(0.4),
        VixLevel::VeryHigh => dec!(0.2),
    };
    let breadth = match (nifty_trend, bank_nifty_trend) {
        (Direction::Bullish, Direction::Bullish) => dec!(1.0),
        (Direction::Bearish, Direction::Bearish) => dec!(0.2),
        _ => dec!(0.5),
    };

    let mut score = state_score * dec!(0.6) + vix_score * dec!(0.25) + breadth * dec!(0.15);

    if state == MarketState::Bearish {
        score = score.min(dec!(0.40));
    }
    if vix == VixLevel::VeryHigh {
        score = score.min(dec!(0.25));
    }
    if state == MarketState::Bullish {
        score = score.max(dec!(0.70));
    }

    score.clamp(Decimal::ZERO, dec!(1))
}

/// Build a full [`MarketContext`] from raw histories. Never fails.
pub fn compute_market_context(
    histories: &MarketHistories,
    config: &MarketContextConfig,
) -> MarketContext {
    let nifty = index_snapshot(histories.nifty.as_deref(), config);
    let bank_nifty = index_snapshot(histories.bank_nifty.as_deref(), config);

    let vix_value = match histories.vix.as_deref().and_then(|h| h.last()) {
        Some(point) => point.close,
        None => {
            debug!(fallback = %config.vix_fallback, "VIX history unavailable, using fallback");
            config.vix_fallback
        }
    };

    let nifty_trend = classify_trend(&nifty);
    let bank_nifty_trend = classify_trend(&bank_nifty);
    let vix_level = classify_vix(vix_value, config);
    let market_state = determine_market_state(nifty_trend, bank_nifty_trend, vix_level);

    MarketContext {
        nifty_trend,
        bank_nifty_trend,
        vix_level,
        market_state,
        nifty_price: nifty.price,
        nifty_20dma: nifty.ma20,
        nifty_50dma: nifty.ma50,
        bank_nifty_price: bank_nifty.price,
        bank_nifty_20dma: bank_nifty.ma20,
        bank_nifty_50dma: bank_nifty.ma50,
        vix_value,
        signal_quality: signal_quality(
            &nifty,
            nifty_trend,
            bank_nifty_trend,
            config.volume_confirmation_score,
        ),
        favorability: favorability(market_state, vix_level, nifty_trend, bank_nifty_trend),
        timestamp: now_unix(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Cached provider
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct CachedContext {
    computed_at: Instant,
    context: Arc<MarketContext>,
}

/// Market context with a single-entry TTL cache.
///
/// The entry is replaced as one value under the lock, so readers see either
/// the old `(computed_at, context)` pair or the new one.
#[derive(Debug)]
pub struct MarketContextProvider {
    config: MarketContextConfig,
    cache: Mutex<Option<CachedContext>>,
}

impl MarketContextProvider {
    pub fn new(config: MarketContextConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(None),
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.cache_ttl_seconds)
    }

    /// Return the cached context when fresh, otherwise compute and cache.
    ///
    /// A cache hit returns the same `Arc` as the computation that filled it.
    /// The lock is only held to read or replace the entry, never while
    /// computing, so concurrent refreshes do not queue behind each other.
    pub fn get_market_context(
        &self,
        histories: &MarketHistories,
        use_cache: bool,
    ) -> Arc<MarketContext> {
        if use_cache {
            if let Some(context) = self.fresh_entry() {
                return context;
            }
        }

        let context = Arc::new(compute_market_context(histories, &self.config));
        info!(
            state = %context.market_state,
            nifty = %context.nifty_trend,
            bank_nifty = %context.bank_nifty_trend,
            vix = %context.vix_value,
            vix_level = %context.vix_level,
            favorability = %context.favorability,
            "market context computed"
        );

        match self.cache.lock() {
            Ok(mut guard) => {
                *guard = Some(CachedContext {
                    computed_at: Instant::now(),
                    context: Arc::clone(&context),
                });
            }
            Err(_) => warn!("market context cache lock poisoned, result not cached"),
        }
        context
    }

    fn fresh_entry(&self) -> Option<Arc<MarketContext>> {
        let guard = match self.cache.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("market context cache lock poisoned, computing uncached");
                return None;
            }
        };
        let entry = guard.as_ref()?;
        let age = entry.computed_at.elapsed();
        if age < self.ttl() {
            debug!(age_secs = age.as_secs(), "market context cache hit");
            Some(Arc::clone(&entry.context))
        } else {
            None
        }
    }

    pub fn clear_cache(&self) {
        if let Ok(mut guard) = self.cache.lock() {
            *guard = None;
        }
    }

    /// Age of the cached entry, if any.
    pub fn cache_age(&self) -> Option<Duration> {
        self.cache
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|entry| entry.computed_at.elapsed()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn series(closes: impl IntoIterator<Item = Decimal>) -> Vec<PricePoint> {
        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| PricePoint {
                timestamp: 1_700_000_000 + i as i64 * 86_400,
                open: close,
                high: close,
                low: close,
                close,
                volume: dec!(1000),
            })
            .collect()
    }

    fn rising(n: u64) -> Vec<PricePoint> {
        series((0..n).map(|i| dec!(100) + Decimal::from(i)))
    }

    fn falling(n: u64) -> Vec<PricePoint> {
        series((0..n).map(|i| dec!(300) - Decimal::from(i)))
    }

    fn histories(nifty: Vec<PricePoint>, bank: Vec<PricePoint>, vix: Decimal) -> MarketHistories {
        MarketHistories {
            nifty: Some(nifty),
            bank_nifty: Some(bank),
            vix: Some(series([vix])),
        }
    }

    fn snap(price: Decimal, ma20: Decimal, ma50: Decimal) -> IndexSnapshot {
        IndexSnapshot { price, ma20, ma50 }
    }

    // -- Snapshot ----------------------------------------------------------

    #[test]
    fn test_snapshot_full_history() {
        let cfg = MarketContextConfig::default();
        let s = index_snapshot(Some(&rising(60)[..]), &cfg);
        assert_eq!(s.price, dec!(159));
        assert_eq!(s.ma20, d("149.5"));
        assert_eq!(s.ma50, d("134.5"));
    }

    #[test]
    fn test_snapshot_medium_falls_back_to_short() {
        let cfg = MarketContextConfig::default();
        let s = index_snapshot(Some(&rising(30)[..]), &cfg);
        assert_eq!(s.ma20, d("119.5"));
        assert_eq!(s.ma50, s.ma20);
    }

    #[test]
    fn test_snapshot_short_history_uses_price() {
        let cfg = MarketContextConfig::default();
        let s = index_snapshot(Some(&rising(10)[..]), &cfg);
        assert_eq!(s, snap(dec!(109), dec!(109), dec!(109)));
    }

    #[test]
    fn test_snapshot_missing_or_empty() {
        let cfg = MarketContextConfig::default();
        assert_eq!(index_snapshot(None, &cfg), IndexSnapshot::default());
        assert_eq!(index_snapshot(Some(&[][..]), &cfg), IndexSnapshot::default());
    }

    // -- Classification ----------------------------------------------------

    #[test]
    fn test_classify_trend() {
        assert_eq!(classify_trend(&snap(dec!(110), dec!(105), dec!(100))), Direction::Bullish);
        assert_eq!(classify_trend(&snap(dec!(90), dec!(95), dec!(100))), Direction::Bearish);
        assert_eq!(classify_trend(&snap(dec!(100), dec!(95), dec!(105))), Direction::Neutral);
        assert_eq!(classify_trend(&snap(dec!(100), dec!(0), dec!(95))), Direction::Neutral);
    }

    #[test]
    fn test_classify_vix_boundaries() {
        let cfg = MarketContextConfig::default();
        assert_eq!(classify_vix(d("14.99"), &cfg), VixLevel::Low);
        assert_eq!(classify_vix(dec!(15), &cfg), VixLevel::Moderate);
        assert_eq!(classify_vix(dec!(20), &cfg), VixLevel::High);
        assert_eq!(classify_vix(dec!(25), &cfg), VixLevel::VeryHigh);
    }

    #[test]
    fn test_market_state_volatility_overrides_trend() {
        use Direction::*;
        assert_eq!(determine_market_state(Bullish, Bullish, VixLevel::High), MarketState::Volatile);
        assert_eq!(determine_market_state(Bullish, Bullish, VixLevel::Low), MarketState::Bullish);
        assert_eq!(
            determine_market_state(Bearish, Bearish, VixLevel::Moderate),
            MarketState::Bearish
        );
        assert_eq!(determine_market_state(Bullish, Bearish, VixLevel::Low), MarketState::Neutral);
    }

    // -- Quality / favorability --------------------------------------------

    #[test]
    fn test_signal_quality_full_distance_and_agreement() {
        let s = snap(dec!(105), dec!(100), dec!(100));
        let q = signal_quality(&s, Direction::Bullish, Direction::Bullish, dec!(0.7));
        assert_eq!(q, d("0.94"));
    }

    #[test]
    fn test_signal_quality_missing_index_and_disagreement() {
        let q = signal_quality(
            &IndexSnapshot::default(),
            Direction::Bullish,
            Direction::Bearish,
            dec!(0.7),
        );
        // 0.5*0.4 + 0.7*0.2 + 0.3*0.4
        assert_eq!(q, d("0.46"));
    }

    #[test]
    fn test_signal_quality_both_neutral() {
        let s = snap(dec!(100), dec!(100), dec!(100));
        let q = signal_quality(&s, Direction::Neutral, Direction::Neutral, dec!(0.7));
        assert_eq!(q, d("0.38"));
    }

    #[test]
    fn test_favorability_bullish_calm() {
        let f = favorability(
            MarketState::Bullish,
            VixLevel::Low,
            Direction::Bullish,
            Direction::Bullish,
        );
        assert_eq!(f, d("0.885"));
    }

    #[test]
    fn test_favorability_bullish_floor() {
        // Bullish state with a weak VIX score and split breadth still floors at 0.70.
        let f = favorability(
            MarketState::Bullish,
            VixLevel::High,
            Direction::Bullish,
            Direction::Neutral,
        );
        assert_eq!(f, d("0.70"));
    }

    #[test]
    fn test_favorability_bearish_ceiling() {
        let f = favorability(
            MarketState::Bearish,
            VixLevel::Low,
            Direction::Bearish,
            Direction::Bearish,
        );
        assert_eq!(f, d("0.40"));
    }

    #[test]
    fn test_favorability_extreme_vix_ceiling() {
        let f = favorability(
            MarketState::Volatile,
            VixLevel::VeryHigh,
            Direction::Neutral,
            Direction::Neutral,
        );
        assert_eq!(f, d("0.25"));
    }

    // -- compute_market_context --------------------------------------------

    #[test]
    fn test_context_bullish_market() {
        let cfg = MarketContextConfig::default();
        let ctx = compute_market_context(&histories(rising(60), rising(60), dec!(12)), &cfg);
        assert_eq!(ctx.nifty_trend, Direction::Bullish);
        assert_eq!(ctx.bank_nifty_trend, Direction::Bullish);
        assert_eq!(ctx.vix_level, VixLevel::Low);
        assert_eq!(ctx.market_state, MarketState::Bullish);
        assert!(ctx.favorability >= d("0.70"));
        assert!(ctx.signal_quality > Decimal::ZERO && ctx.signal_quality <= dec!(1));
    }

    #[test]
    fn test_context_bearish_market() {
        let cfg = MarketContextConfig::default();
        let ctx = compute_market_context(&histories(falling(60), falling(60), dec!(17)), &cfg);
        assert_eq!(ctx.market_state, MarketState::Bearish);
        assert!(ctx.favorability <= d("0.40"));
        assert!(ctx.nifty_vs_50dma().unwrap() < Decimal::ZERO);
    }

    #[test]
    fn test_context_volatile_market() {
        let cfg = MarketContextConfig::default();
        let ctx = compute_market_context(&histories(rising(60), rising(60), dec!(28)), &cfg);
        assert_eq!(ctx.vix_level, VixLevel::VeryHigh);
        assert_eq!(ctx.market_state, MarketState::Volatile);
        assert!(ctx.favorability <= d("0.25"));
    }

    #[test]
    fn test_context_fails_open_without_data() {
        let cfg = MarketContextConfig::default();
        let ctx = compute_market_context(&MarketHistories::default(), &cfg);
        assert_eq!(ctx.nifty_trend, Direction::Neutral);
        assert_eq!(ctx.bank_nifty_trend, Direction::Neutral);
        assert_eq!(ctx.vix_value, dec!(18.0));
        assert_eq!(ctx.vix_level, VixLevel::Moderate);
        assert_eq!(ctx.market_state, MarketState::Neutral);
        assert_eq!(ctx.nifty_price, Decimal::ZERO);
        assert!(ctx.nifty_vs_50dma().is_none());
    }

    // -- Provider cache ----------------------------------------------------

    #[test]
    fn test_cache_hit_returns_same_context() {
        let provider = MarketContextProvider::new(MarketContextConfig::default());
        let h = histories(rising(60), rising(60), dec!(12));
        let first = provider.get_market_context(&h, true);
        // Different inputs, still served from cache.
        let other = histories(falling(60), falling(60), dec!(30));
        let second = provider.get_market_context(&other, true);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(provider.cache_age().is_some());
    }

    #[test]
    fn test_cache_bypass_recomputes() {
        let provider = MarketContextProvider::new(MarketContextConfig::default());
        let first = provider.get_market_context(&histories(rising(60), rising(60), dec!(12)), true);
        let bearish = histories(falling(60), falling(60), dec!(17));
        let fresh = provider.get_market_context(&bearish, false);
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(fresh.market_state, MarketState::Bearish);

        // The bypass refreshed the cache entry too.
        let cached = provider.get_market_context(&MarketHistories::default(), true);
        assert!(Arc::ptr_eq(&fresh, &cached));
    }

    #[test]
    fn test_cache_expired_with_zero_ttl() {
        let cfg = MarketContextConfig {
            cache_ttl_seconds: 0,
            ..MarketContextConfig::default()
        };
        let provider = MarketContextProvider::new(cfg);
        let h = histories(rising(60), rising(60), dec!(12));
        let first = provider.get_market_context(&h, true);
        let second = provider.get_market_context(&h, true);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_clear_cache() {
        let provider = MarketContextProvider::new(MarketContextConfig::default());
        let h = histories(rising(60), rising(60), dec!(12));
        let first = provider.get_market_context(&h, true);
        provider.clear_cache();
        assert!(provider.cache_age().is_none());
        let second = provider.get_market_context(&h, true);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, MarketContext { timestamp: first.timestamp, ..(*second).clone() });
    }

    #[test]
    fn test_concurrent_readers_share_one_entry() {
        let provider = Arc::new(MarketContextProvider::new(MarketContextConfig::default()));
        let bullish = histories(rising(60), rising(60), dec!(12));
        let seeded = provider.get_market_context(&bullish, true);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                std::thread::spawn(move || {
                    provider.get_market_context(&MarketHistories::default(), true)
                })
            })
            .collect();

        for handle in handles {
            let ctx = handle.join().unwrap();
            assert!(Arc::ptr_eq(&ctx, &seeded));
        }
    }

    #[test]
    fn test_concurrent_bypass_callers_each_compute() {
        let provider = Arc::new(MarketContextProvider::new(MarketContextConfig::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                std::thread::spawn(move || {
                    let h = histories(falling(60), falling(60), dec!(17));
                    provider.get_market_context(&h, false)
                })
            })
            .collect();
        let results: Vec<Arc<MarketContext>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        for (i, a) in results.iter().enumerate() {
            assert_eq!(a.market_state, MarketState::Bearish);
            for b in &results[i + 1..] {
                assert!(!Arc::ptr_eq(a, b));
            }
        }

        // The last store wins and is one of the computed snapshots.
        let cached = provider.get_market_context(&MarketHistories::default(), true);
        assert!(results.iter().any(|r| Arc::ptr_eq(r, &cached)));
    }

    #[test]
    fn test_poisoned_lock_still_computes() {
        let provider = Arc::new(MarketContextProvider::new(MarketContextConfig::default()));
        let poisoner = Arc::clone(&provider);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.cache.lock().unwrap();
            panic!("poison the cache lock");
        })
        .join();

        let h = histories(rising(60), rising(60), dec!(12));
        let first = provider.get_market_context(&h, true);
        let second = provider.get_market_context(&h, true);
        assert_eq!(first.market_state, MarketState::Bullish);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(provider.cache_age().is_none());
    }
}
