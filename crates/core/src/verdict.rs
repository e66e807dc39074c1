//! Policy verdicts and violations.
//!
//! A verdict is the aggregated result of running every policy against one
//! request. Violations are returned as data, never as errors: a denied trade
//! is an expected outcome of normal operation, and the full violation list is
//! kept so audit logs show every policy that would have blocked the trade,
//! not just the first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The specific rule a policy found violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Single trade value above the per-trade cap.
    PerTradeLimitExceeded,
    /// Projected spend above the hourly cap.
    HourlyLimitExceeded,
    /// Projected spend above the daily cap.
    DailyLimitExceeded,
    /// Too many trades inside a lookback window.
    FrequencyLimitExceeded,
    /// Not enough time elapsed since the previous trade.
    MinSpacingViolated,
    /// Request falls outside the active trading window.
    WindowClosed,
    /// A global emergency stop is in force.
    EmergencyStopActive,
    /// Pair (or one of its legs) is not on the allowlist.
    AssetNotAllowed,
}

impl ViolationKind {
    /// Canonical wire/log label for this violation kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerTradeLimitExceeded => "PER_TRADE_LIMIT_EXCEEDED",
            Self::HourlyLimitExceeded => "HOURLY_LIMIT_EXCEEDED",
            Self::DailyLimitExceeded => "DAILY_LIMIT_EXCEEDED",
            Self::FrequencyLimitExceeded => "FREQUENCY_LIMIT_EXCEEDED",
            Self::MinSpacingViolated => "MIN_SPACING_VIOLATED",
            Self::WindowClosed => "WINDOW_CLOSED",
            Self::EmergencyStopActive => "EMERGENCY_STOP_ACTIVE",
            Self::AssetNotAllowed => "ASSET_NOT_ALLOWED",
        }
    }

    /// Name of the policy this violation kind belongs to.
    #[must_use]
    pub fn policy(self) -> &'static str {
        match self {
            Self::PerTradeLimitExceeded
            | Self::HourlyLimitExceeded
            | Self::DailyLimitExceeded => "spending",
            Self::FrequencyLimitExceeded | Self::MinSpacingViolated => "frequency",
            Self::WindowClosed | Self::EmergencyStopActive => "time_window",
            Self::AssetNotAllowed => "asset_allowlist",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violated policy, with a human-readable reason naming the breached
/// limit and the amount by which it was exceeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Policy that produced the violation.
    pub policy: String,

    /// Machine-matchable rule identifier.
    pub kind: ViolationKind,

    /// Specific limit/threshold context for logs and callers.
    pub reason: String,
}

impl Violation {
    /// Creates a violation, deriving the policy name from the kind.
    #[must_use]
    pub fn new(kind: ViolationKind, reason: impl Into<String>) -> Self {
        Self {
            policy: kind.policy().to_string(),
            kind,
            reason: reason.into(),
        }
    }
}

/// Aggregated allow/deny result of one precheck run.
///
/// `allowed` is true iff `violations` is empty. Never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    /// Whether the trade may proceed to execution.
    pub allowed: bool,

    /// Every violated policy, in pipeline order. Empty when allowed.
    pub violations: Vec<Violation>,

    /// When the verdict was produced.
    pub decided_at: DateTime<Utc>,
}

impl PolicyVerdict {
    /// An allow verdict with no violations.
    #[must_use]
    pub fn allow(decided_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            violations: Vec::new(),
            decided_at,
        }
    }

    /// Builds a verdict from an aggregated violation list.
    #[must_use]
    pub fn from_violations(violations: Vec<Violation>, decided_at: DateTime<Utc>) -> Self {
        Self {
            allowed: violations.is_empty(),
            violations,
            decided_at,
        }
    }

    /// A deny verdict carrying a single violation.
    #[must_use]
    pub fn deny(violation: Violation, decided_at: DateTime<Utc>) -> Self {
        Self::from_violations(vec![violation], decided_at)
    }

    /// True if the verdict contains a violation of the given kind.
    #[must_use]
    pub fn has(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    /// Comma-separated violation kinds, for log lines.
    #[must_use]
    pub fn kinds(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.kind.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}
