//! Aggregate gate metrics.
//!
//! Plain counters covering the whole authorize pipeline, kept behind one
//! lock and snapshotted for the status surface. Denials also push a
//! timestamp into a short rolling record so `recent_violation_count` can be
//! reported without re-deriving it from logs.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Lookback used for `recent_violation_count`.
const RECENT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Authorization requests received.
    pub requests: u64,

    /// Requests that passed precheck (fresh allows, not cache hits).
    pub allowed: u64,

    /// Requests denied by the precheck pipeline.
    pub denied: u64,

    /// Requests served from the permission cache.
    pub cache_hits: u64,

    /// Requests denied up front by the emergency stop.
    pub emergency_rejections: u64,

    /// Requests rejected fast by the open circuit.
    pub breaker_rejections: u64,

    /// Successful downstream executions.
    pub executions: u64,

    /// Failed downstream executions (timeouts included).
    pub execution_failures: u64,

    /// Executions that failed specifically on the timeout.
    pub timeouts: u64,
}

struct Inner {
    snapshot: MetricsSnapshot,
    recent_denials: VecDeque<(DateTime<Utc>, usize)>,
}

/// Thread-safe metrics collector.
pub struct GateMetrics {
    inner: RwLock<Inner>,
}

impl Default for GateMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GateMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                snapshot: MetricsSnapshot::default(),
                recent_denials: VecDeque::new(),
            }),
        }
    }

    pub fn record_request(&self) {
        self.inner.write().snapshot.requests += 1;
    }

    pub fn record_allowed(&self) {
        self.inner.write().snapshot.allowed += 1;
    }

    /// Records a denial carrying `violation_count` violations at `now`.
    pub fn record_denied(&self, now: DateTime<Utc>, violation_count: usize) {
        let mut inner = self.inner.write();
        inner.snapshot.denied += 1;
        inner.recent_denials.push_back((now, violation_count));
        prune(&mut inner.recent_denials, now);
    }

    pub fn record_cache_hit(&self) {
        self.inner.write().snapshot.cache_hits += 1;
    }

    pub fn record_emergency_rejection(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.write();
        inner.snapshot.emergency_rejections += 1;
        inner.recent_denials.push_back((now, 1));
        prune(&mut inner.recent_denials, now);
    }

    pub fn record_breaker_rejection(&self) {
        self.inner.write().snapshot.breaker_rejections += 1;
    }

    pub fn record_execution(&self) {
        self.inner.write().snapshot.executions += 1;
    }

    pub fn record_execution_failure(&self, timed_out: bool) {
        let mut inner = self.inner.write();
        inner.snapshot.execution_failures += 1;
        if timed_out {
            inner.snapshot.timeouts += 1;
        }
    }

    /// Total violations across denials inside the recent window.
    #[must_use]
    pub fn recent_violation_count(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write();
        prune(&mut inner.recent_denials, now);
        inner.recent_denials.iter().map(|(_, count)| count).sum()
    }

    /// Copies out the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.read().snapshot.clone()
    }
}

fn prune(denials: &mut VecDeque<(DateTime<Utc>, usize)>, now: DateTime<Utc>) {
    let cutoff = now - ChronoDuration::from_std(RECENT_WINDOW).unwrap_or_default();
    while denials.front().is_some_and(|(at, _)| *at < cutoff) {
        denials.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, m, 0).unwrap()
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = GateMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_allowed();
        metrics.record_execution();
        metrics.record_execution_failure(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.allowed, 1);
        assert_eq!(snapshot.executions, 1);
        assert_eq!(snapshot.execution_failures, 1);
        assert_eq!(snapshot.timeouts, 1);
    }

    #[test]
    fn test_recent_violation_count_sums_and_expires() {
        let metrics = GateMetrics::new();
        metrics.record_denied(at(0), 2);
        metrics.record_denied(at(5), 3);
        assert_eq!(metrics.recent_violation_count(at(6)), 5);

        // 16 minutes later the first denial has aged out.
        assert_eq!(metrics.recent_violation_count(at(16)), 3);
    }

    #[test]
    fn test_emergency_rejection_counts_as_recent_violation() {
        let metrics = GateMetrics::new();
        metrics.record_emergency_rejection(at(0));
        assert_eq!(metrics.snapshot().emergency_rejections, 1);
        assert_eq!(metrics.recent_violation_count(at(1)), 1);
    }
}
