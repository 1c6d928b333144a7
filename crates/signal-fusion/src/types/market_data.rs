use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::FusionError;

/// A single daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Bar date as unix seconds.
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
}

impl PricePoint {
    /// Check the bar invariants: nothing negative, and `low <= open, close <= high`.
    ///
    /// `index` is the bar's position in its history and is only used for the
    /// error message.
    pub fn validate(&self, index: usize) -> Result<(), FusionError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (name, value) in fields {
            if value < Decimal::ZERO {
                return Err(FusionError::InvalidPricePoint {
                    index,
                    reason: format!("{name} is negative ({value})"),
                });
            }
        }

        if self.low > self.high {
            return Err(FusionError::InvalidPricePoint {
                index,
                reason: format!("low {} above high {}", self.low, self.high),
            });
        }

        for (name, value) in [("open", self.open), ("close", self.close)] {
            if value < self.low || value > self.high {
                return Err(FusionError::InvalidPricePoint {
                    index,
                    reason: format!(
                        "{name} {value} outside [{low}, {high}]",
                        low = self.low,
                        high = self.high
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Validate every bar of a chronological history.
pub fn validate_history(points: &[PricePoint]) -> Result<(), FusionError> {
    points
        .iter()
        .enumerate()
        .try_for_each(|(i, p)| p.validate(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> PricePoint {
        PricePoint {
            timestamp: 1_700_000_000,
            open,
            high,
            low,
            close,
            volume: dec!(1000),
        }
    }

    #[test]
    fn test_valid_bar() {
        assert!(bar(dec!(100), dec!(105), dec!(98), dec!(103)).validate(0).is_ok());
    }

    #[test]
    fn test_close_above_high_rejected() {
        let err = bar(dec!(100), dec!(105), dec!(98), dec!(106))
            .validate(3)
            .unwrap_err();
        assert!(err.to_string().contains("index 3"));
        assert!(err.to_string().contains("close"));
    }

    #[test]
    fn test_negative_volume_rejected() {
        let mut p = bar(dec!(100), dec!(105), dec!(98), dec!(103));
        p.volume = dec!(-1);
        let err = p.validate(0).unwrap_err();
        assert!(err.to_string().contains("volume is negative"));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = bar(dec!(100), dec!(95), dec!(98), dec!(97))
            .validate(0)
            .unwrap_err();
        assert!(err.to_string().contains("above high"));
    }

    #[test]
    fn test_validate_history_reports_first_bad_index() {
        let good = bar(dec!(100), dec!(105), dec!(98), dec!(103));
        let bad = bar(dec!(100), dec!(105), dec!(98), dec!(90));
        let err = validate_history(&[good.clone(), good, bad]).unwrap_err();
        assert!(matches!(err, FusionError::InvalidPricePoint { index: 2, .. }));
    }

    #[test]
    fn test_serde_decimal_as_string() {
        let p = bar(dec!(100.5), dec!(101), dec!(100), dec!(100.75));
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"open\":\"100.5\""));
    }
}
