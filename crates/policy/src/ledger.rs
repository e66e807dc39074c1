//! Spending ledger with lazy window resets.
//!
//! Tracks cumulative spend against per-trade, hourly, and daily caps. The
//! hourly window resets at the top of each UTC hour and the daily window at
//! UTC midnight. Resets are lazy: every operation first checks whether a
//! boundary has passed since the window started and zeroes the spent total
//! if so. Because the check-and-reset runs inside the ledger mutex, no
//! reader can observe a half-reset window and concurrent accesses around a
//! boundary reset exactly once.
//!
//! `projected` is the read-only side used by the precheck pipeline; `commit`
//! mutates the totals and is called only after a real, successful execution.

use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use trade_gate_core::config::SpendingConfig;
use trade_gate_core::verdict::{Violation, ViolationKind};
use tracing::{debug, info};

/// One rolling spend window (hourly or daily).
#[derive(Debug, Clone)]
struct SpendWindow {
    limit: Decimal,
    spent: Decimal,
    started: DateTime<Utc>,
}

impl SpendWindow {
    fn new(limit: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            limit,
            spent: Decimal::ZERO,
            started: now,
        }
    }

    fn remaining(&self) -> Decimal {
        (self.limit - self.spent).max(Decimal::ZERO)
    }
}

#[derive(Debug)]
struct LedgerWindows {
    hourly: SpendWindow,
    daily: SpendWindow,
}

/// Read-only projection of what a candidate spend would do to the ledger.
#[derive(Debug, Clone)]
pub struct SpendProjection {
    /// Violations the candidate amount would incur. Empty when within limits.
    pub violations: Vec<Violation>,

    /// Headroom left in the hourly window before the candidate amount.
    pub remaining_hourly: Decimal,

    /// Headroom left in the daily window before the candidate amount.
    pub remaining_daily: Decimal,
}

impl SpendProjection {
    /// True when the candidate amount fits every cap.
    #[must_use]
    pub fn within_limits(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Snapshot of ledger utilization for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerUtilization {
    pub per_trade_limit: Decimal,
    pub hourly_spent: Decimal,
    pub hourly_limit: Decimal,
    pub daily_spent: Decimal,
    pub daily_limit: Decimal,
}

/// Thread-safe spending ledger.
pub struct SpendingLedger {
    per_trade_limit: Decimal,
    inner: Mutex<LedgerWindows>,
}

impl std::fmt::Debug for SpendingLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SpendingLedger")
            .field("per_trade_limit", &self.per_trade_limit)
            .field("hourly_spent", &inner.hourly.spent)
            .field("daily_spent", &inner.daily.spent)
            .finish()
    }
}

impl SpendingLedger {
    /// Creates a ledger with zeroed counters starting at `now`.
    #[must_use]
    pub fn new(config: &SpendingConfig, now: DateTime<Utc>) -> Self {
        Self {
            per_trade_limit: config.per_trade_limit,
            inner: Mutex::new(LedgerWindows {
                hourly: SpendWindow::new(config.hourly_limit, now),
                daily: SpendWindow::new(config.daily_limit, now),
            }),
        }
    }

    /// Projects a candidate spend against all three caps.
    ///
    /// Read-only apart from the lazy window reset. Returns every cap the
    /// amount would breach, each reporting the overshoot.
    pub fn projected(&self, amount: Decimal, now: DateTime<Utc>) -> SpendProjection {
        let mut inner = self.inner.lock();
        roll_windows(&mut inner, now);

        let mut violations = Vec::new();

        if amount > self.per_trade_limit {
            violations.push(Violation::new(
                ViolationKind::PerTradeLimitExceeded,
                format!(
                    "amount {amount} exceeds per-trade limit {} by {}",
                    self.per_trade_limit,
                    amount - self.per_trade_limit
                ),
            ));
        }

        let projected_hourly = inner.hourly.spent + amount;
        if projected_hourly > inner.hourly.limit {
            violations.push(Violation::new(
                ViolationKind::HourlyLimitExceeded,
                format!(
                    "projected hourly spend {projected_hourly} exceeds limit {} by {}",
                    inner.hourly.limit,
                    projected_hourly - inner.hourly.limit
                ),
            ));
        }

        let projected_daily = inner.daily.spent + amount;
        if projected_daily > inner.daily.limit {
            violations.push(Violation::new(
                ViolationKind::DailyLimitExceeded,
                format!(
                    "projected daily spend {projected_daily} exceeds limit {} by {}",
                    inner.daily.limit,
                    projected_daily - inner.daily.limit
                ),
            ));
        }

        SpendProjection {
            violations,
            remaining_hourly: inner.hourly.remaining(),
            remaining_daily: inner.daily.remaining(),
        }
    }

    /// Commits an executed spend to both windows.
    ///
    /// Called only after a successful execution; a failed execution never
    /// consumes budget.
    pub fn commit(&self, amount: Decimal, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        roll_windows(&mut inner, now);
        inner.hourly.spent += amount;
        inner.daily.spent += amount;
        debug!(
            %amount,
            hourly_spent = %inner.hourly.spent,
            daily_spent = %inner.daily.spent,
            "spend committed"
        );
    }

    /// Current utilization snapshot.
    pub fn utilization(&self, now: DateTime<Utc>) -> LedgerUtilization {
        let mut inner = self.inner.lock();
        roll_windows(&mut inner, now);
        LedgerUtilization {
            per_trade_limit: self.per_trade_limit,
            hourly_spent: inner.hourly.spent,
            hourly_limit: inner.hourly.limit,
            daily_spent: inner.daily.spent,
            daily_limit: inner.daily.limit,
        }
    }

    /// Spend recorded in the current hourly window.
    #[must_use]
    pub fn hourly_spent(&self, now: DateTime<Utc>) -> Decimal {
        self.utilization(now).hourly_spent
    }

    /// Spend recorded in the current daily window.
    #[must_use]
    pub fn daily_spent(&self, now: DateTime<Utc>) -> Decimal {
        self.utilization(now).daily_spent
    }
}

/// Applies lazy resets for any window whose boundary has passed.
///
/// Only a forward boundary crossing resets: a request carrying a timestamp
/// earlier than the window start leaves the totals alone, so stale or
/// out-of-order requests cannot wipe the accounting.
///
/// Must run under the ledger mutex.
fn roll_windows(inner: &mut LedgerWindows, now: DateTime<Utc>) {
    let hour_rolled = (now.date_naive(), now.hour())
        > (inner.hourly.started.date_naive(), inner.hourly.started.hour());
    if hour_rolled {
        info!(
            previous_spent = %inner.hourly.spent,
            window = "hourly",
            "spend window reset"
        );
        inner.hourly.spent = Decimal::ZERO;
        inner.hourly.started = now;
    }

    if now.date_naive() > inner.daily.started.date_naive() {
        info!(
            previous_spent = %inner.daily.spent,
            window = "daily",
            "spend window reset"
        );
        inner.daily.spent = Decimal::ZERO;
        inner.daily.started = now;
    }
}
