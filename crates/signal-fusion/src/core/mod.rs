pub mod fusion;
pub mod indicators;
pub mod market_context;
pub mod no_trade;
pub mod pipeline;
pub mod reversal_watch;
pub mod trade_levels;

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current UNIX timestamp in seconds.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
