//! Trading window check.

use chrono::{DateTime, Utc};
use trade_gate_core::config::WindowConfig;
use trade_gate_core::verdict::{Violation, ViolationKind};

/// Bounded interval inside which trading is permitted.
///
/// Either bound may be absent, which leaves that side open. A request
/// outside the window is denied with `WINDOW_CLOSED`.
#[derive(Debug, Clone, Copy)]
pub struct TradingWindow {
    opens_at: Option<DateTime<Utc>>,
    closes_at: Option<DateTime<Utc>>,
}

impl TradingWindow {
    #[must_use]
    pub fn new(config: &WindowConfig) -> Self {
        Self {
            opens_at: config.opens_at,
            closes_at: config.closes_at,
        }
    }

    /// True when `at` falls inside the window (bounds inclusive).
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if self.opens_at.is_some_and(|open| at < open) {
            return false;
        }
        if self.closes_at.is_some_and(|close| at > close) {
            return false;
        }
        true
    }

    /// Checks a request timestamp against the window.
    #[must_use]
    pub fn check(&self, at: DateTime<Utc>) -> Option<Violation> {
        if self.contains(at) {
            return None;
        }
        let bounds = match (self.opens_at, self.closes_at) {
            (Some(open), Some(close)) => format!("window is {open} to {close}"),
            (Some(open), None) => format!("window opens at {open}"),
            (None, Some(close)) => format!("window closed at {close}"),
            (None, None) => unreachable!("unbounded window contains every instant"),
        };
        Some(Violation::new(
            ViolationKind::WindowClosed,
            format!("request at {at} outside trading window: {bounds}"),
        ))
    }
}
