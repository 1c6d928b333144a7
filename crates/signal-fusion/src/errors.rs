use thiserror::Error;

use crate::types::Action;

/// Typed error hierarchy for the signal-fusion core.
///
/// Library operations return these variants directly; the pipeline and the
/// binary wrap them with `anyhow::Context` for propagation.
#[derive(Error, Debug)]
pub enum FusionError {
    // -- Data ---------------------------------------------------------------
    #[error("insufficient data for {indicator}: need {required} points, got {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    #[error("invalid price point at index {index}: {reason}")]
    InvalidPricePoint { index: usize, reason: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    // -- Trade levels -------------------------------------------------------
    #[error("trade levels are only supported for BUY recommendations, got {action}")]
    UnsupportedAction { action: Action },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FusionError::InsufficientData {
            indicator: "analysis",
            required: 200,
            available: 20,
        };
        assert_eq!(err.to_string(), "insufficient data for analysis: need 200 points, got 20");

        let err = FusionError::UnsupportedAction { action: Action::Sell };
        assert_eq!(
            err.to_string(),
            "trade levels are only supported for BUY recommendations, got SELL"
        );
    }
}
