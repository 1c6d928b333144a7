use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// No-trade severity. Ordered so that rules can only raise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the system-wide no-trade gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoTradeSignal {
    pub is_no_trade: bool,
    /// One entry per rule that fired, in rule order.
    pub reasons: Vec<String>,
    pub suggested_action: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReversalStatus {
    NotApplicable,
    WatchOnly,
    Triggered,
}

impl ReversalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotApplicable => "not-applicable",
            Self::WatchOnly => "watch-only",
            Self::Triggered => "triggered",
        }
    }
}

impl fmt::Display for ReversalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reversal confirmation condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalTrigger {
    pub name: String,
    pub met: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub threshold: Decimal,
    pub description: String,
}

/// Reversal-watch annotation for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalWatch {
    pub is_setup: bool,
    pub status: ReversalStatus,
    pub triggers: Vec<ReversalTrigger>,
    #[serde(with = "rust_decimal::serde::str")]
    pub confidence: Decimal,
    pub reasoning: String,
}
