//! Frequency guard: bounded record of recent trades.
//!
//! Keeps an ordered sequence of executed trades, pruned lazily to the
//! configured lookback on every access. The guard owns its limits and
//! exposes the check the precheck pipeline runs (per-minute and per-hour
//! counts plus minimum inter-trade spacing) alongside the raw `record` /
//! `count_since` operations.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use trade_gate_core::config::FrequencyConfig;
use trade_gate_core::types::{TradeRequest, TradeSide};
use trade_gate_core::verdict::{Violation, ViolationKind};
use tracing::debug;

/// One executed trade retained for frequency counting.
#[derive(Debug, Clone)]
pub struct RecentTrade {
    pub at: DateTime<Utc>,
    pub pair: String,
    pub side: TradeSide,
    pub amount: Decimal,
}

/// Thread-safe guard over the recent-trade record.
pub struct FrequencyGuard {
    config: FrequencyConfig,
    inner: Mutex<VecDeque<RecentTrade>>,
}

impl std::fmt::Debug for FrequencyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencyGuard")
            .field("config", &self.config)
            .field("records", &self.inner.lock().len())
            .finish()
    }
}

impl FrequencyGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new(config: FrequencyConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Records an executed trade. Called only after a successful execution.
    pub fn record(&self, request: &TradeRequest) {
        let mut records = self.inner.lock();
        records.push_back(RecentTrade {
            at: request.requested_at,
            pair: request.pair.clone(),
            side: request.side,
            amount: request.amount,
        });
        Self::prune(&mut records, self.config.lookback, request.requested_at);
    }

    /// Counts retained trades at or after `since`.
    pub fn count_since(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> usize {
        let mut records = self.inner.lock();
        Self::prune(&mut records, self.config.lookback, now);
        records.iter().filter(|t| t.at >= since).count()
    }

    /// Timestamp of the most recent retained trade.
    pub fn last_trade_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut records = self.inner.lock();
        Self::prune(&mut records, self.config.lookback, now);
        records.back().map(|t| t.at)
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when no records are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Runs the frequency checks for a candidate trade at `now`.
    ///
    /// Returns every violated rule: per-minute count, per-hour count, and
    /// minimum spacing since the last trade.
    pub fn check(&self, now: DateTime<Utc>) -> Vec<Violation> {
        let mut records = self.inner.lock();
        Self::prune(&mut records, self.config.lookback, now);

        let mut violations = Vec::new();

        let minute_ago = now - ChronoDuration::seconds(60);
        let last_minute = records.iter().filter(|t| t.at >= minute_ago).count();
        if last_minute >= self.config.max_per_minute as usize {
            violations.push(Violation::new(
                ViolationKind::FrequencyLimitExceeded,
                format!(
                    "{last_minute} trades in the last minute, maximum {}",
                    self.config.max_per_minute
                ),
            ));
        }

        let hour_ago = now - ChronoDuration::seconds(3600);
        let last_hour = records.iter().filter(|t| t.at >= hour_ago).count();
        if last_hour >= self.config.max_per_hour as usize {
            violations.push(Violation::new(
                ViolationKind::FrequencyLimitExceeded,
                format!(
                    "{last_hour} trades in the last hour, maximum {}",
                    self.config.max_per_hour
                ),
            ));
        }

        if let Some(last) = records.back() {
            let elapsed = now - last.at;
            let min_spacing =
                ChronoDuration::from_std(self.config.min_spacing).unwrap_or_default();
            if elapsed < min_spacing {
                violations.push(Violation::new(
                    ViolationKind::MinSpacingViolated,
                    format!(
                        "only {}s since last trade, minimum spacing {}s",
                        elapsed.num_seconds(),
                        min_spacing.num_seconds()
                    ),
                ));
            }
        }

        violations
    }

    /// Drops records older than the lookback window. Pruning is the only
    /// deletion path.
    fn prune(records: &mut VecDeque<RecentTrade>, lookback: std::time::Duration, now: DateTime<Utc>) {
        let cutoff = now - ChronoDuration::from_std(lookback).unwrap_or_default();
        let before = records.len();
        while records.front().is_some_and(|t| t.at < cutoff) {
            records.pop_front();
        }
        let pruned = before - records.len();
        if pruned > 0 {
            debug!(pruned, retained = records.len(), "pruned recent trades");
        }
    }
}
