//! Safety monitor: drawdown tracking and the global emergency stop.
//!
//! Where the circuit breaker reacts to infrastructure failures, the safety
//! monitor reacts to financial ones. Every completed execution reports its
//! realized P&L delta here; losses accumulate into a running drawdown
//! percentage of the reference portfolio value, gains pay it back down, and
//! crossing the configured maximum trips a global emergency stop.
//!
//! The stop is sticky. Unlike the breaker it never self-heals on a timer:
//! only an explicit operator `resume` clears it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use trade_gate_core::config::SafetyConfig;
use tracing::{error, info, warn};

/// Why and when the emergency stop was engaged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopInfo {
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Read-only snapshot of the safety state.
#[derive(Debug, Clone, Serialize)]
pub struct SafetySnapshot {
    pub realized_pnl: Decimal,
    pub drawdown_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub emergency_stop: Option<StopInfo>,
}

#[derive(Debug)]
struct Inner {
    realized_pnl: Decimal,
    drawdown_pct: Decimal,
    emergency_stop: Option<StopInfo>,
}

/// Thread-safe safety monitor.
pub struct SafetyMonitor {
    config: SafetyConfig,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for SafetyMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SafetyMonitor")
            .field("config", &self.config)
            .field("realized_pnl", &inner.realized_pnl)
            .field("drawdown_pct", &inner.drawdown_pct)
            .field("stopped", &inner.emergency_stop.is_some())
            .finish()
    }
}

impl SafetyMonitor {
    /// Creates a monitor with zeroed counters and no stop engaged.
    #[must_use]
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                realized_pnl: Decimal::ZERO,
                drawdown_pct: Decimal::ZERO,
                emergency_stop: None,
            }),
        }
    }

    /// Records the realized P&L delta of a completed execution.
    ///
    /// A loss adds `|loss| / reference_value * 100` to the drawdown; a gain
    /// subtracts the same ratio, floored at zero. Crossing the configured
    /// maximum engages the emergency stop.
    pub fn record_outcome(&self, pnl_delta: Decimal) {
        let mut inner = self.inner.write();
        inner.realized_pnl += pnl_delta;

        let pct = if self.config.reference_value > Decimal::ZERO {
            pnl_delta.abs() / self.config.reference_value * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        if pnl_delta < Decimal::ZERO {
            inner.drawdown_pct += pct;
        } else {
            inner.drawdown_pct = (inner.drawdown_pct - pct).max(Decimal::ZERO);
        }

        if inner.drawdown_pct >= self.config.max_drawdown_pct && inner.emergency_stop.is_none() {
            let reason = format!(
                "drawdown {:.2}% crossed maximum {:.2}%",
                inner.drawdown_pct, self.config.max_drawdown_pct
            );
            error!(
                drawdown_pct = %inner.drawdown_pct,
                max_drawdown_pct = %self.config.max_drawdown_pct,
                "emergency stop engaged"
            );
            inner.emergency_stop = Some(StopInfo {
                reason,
                at: Utc::now(),
            });
        }
    }

    /// Operator override: halts all trading immediately.
    pub fn emergency_stop(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%reason, "emergency stop engaged by operator");
        self.inner.write().emergency_stop = Some(StopInfo {
            reason,
            at: Utc::now(),
        });
    }

    /// Operator override: clears the stop and resets the drawdown baseline.
    ///
    /// Resetting the drawdown is deliberate: resuming with the old drawdown
    /// intact would re-trip on the very next loss.
    pub fn resume(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut inner = self.inner.write();
        if inner.emergency_stop.take().is_some() {
            inner.drawdown_pct = Decimal::ZERO;
            info!(%reason, "emergency stop cleared, drawdown baseline reset");
        } else {
            info!(%reason, "resume requested with no stop engaged");
        }
    }

    /// True while the emergency stop is engaged.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.read().emergency_stop.is_some()
    }

    /// Cumulative realized P&L.
    #[must_use]
    pub fn realized_pnl(&self) -> Decimal {
        self.inner.read().realized_pnl
    }

    /// Current running drawdown percentage.
    #[must_use]
    pub fn drawdown_pct(&self) -> Decimal {
        self.inner.read().drawdown_pct
    }

    /// Snapshot for the status surface.
    #[must_use]
    pub fn snapshot(&self) -> SafetySnapshot {
        let inner = self.inner.read();
        SafetySnapshot {
            realized_pnl: inner.realized_pnl,
            drawdown_pct: inner.drawdown_pct,
            max_drawdown_pct: self.config.max_drawdown_pct,
            emergency_stop: inner.emergency_stop.clone(),
        }
    }
}
