//! The authorization facade.
//!
//! Single entry point for callers proposing trades. Composes the no-trade
//! fast paths and the execution path in a fixed order:
//!
//! 1. Emergency stop — denies immediately, bypassing everything else.
//! 2. Permission cache — a hit returns the cached allow-verdict directly.
//! 3. Policy precheck — any violation denies without touching the ledger.
//! 4. Breaker-wrapped execution with a timeout; only an unambiguous success
//!    commits spend, records the trade, caches the verdict, and feeds the
//!    safety monitor.
//!
//! Denials are data (`AuthorizationOutcome` with `allowed == false`), never
//! errors. Errors cover only the cases where execution was warranted but
//! could not complete: an open circuit or a downstream failure.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use trade_gate_core::config::GateConfig;
use trade_gate_core::traits::{ExecutionError, ExecutionReport, TradeExecutor};
use trade_gate_core::types::TradeRequest;
use trade_gate_core::verdict::{PolicyVerdict, Violation, ViolationKind};
use trade_gate_guard::breaker::{BreakerError, BreakerState, CircuitBreaker};
use trade_gate_guard::safety::SafetyMonitor;
use trade_gate_policy::allowlist::AssetAllowlist;
use trade_gate_policy::cache::PermissionCache;
use trade_gate_policy::frequency::FrequencyGuard;
use trade_gate_policy::ledger::{LedgerUtilization, SpendingLedger};
use trade_gate_policy::precheck::PolicyEngine;
use trade_gate_policy::window::TradingWindow;
use tracing::{info, warn};

use crate::metrics::{GateMetrics, MetricsSnapshot};

/// Outcome of an authorization call that did not error.
#[derive(Debug, Clone)]
pub struct AuthorizationOutcome {
    /// The verdict backing the decision.
    pub verdict: PolicyVerdict,

    /// True when the verdict came from the permission cache.
    pub cached: bool,

    /// Present iff a fresh execution ran and succeeded.
    pub execution: Option<ExecutionReport>,
}

impl AuthorizationOutcome {
    /// Whether the trade was authorized.
    #[must_use]
    pub fn allowed(&self) -> bool {
        self.verdict.allowed
    }
}

/// Errors where execution was warranted but could not complete.
#[derive(Debug, Error)]
pub enum AuthorizeError {
    /// The circuit breaker rejected the call without invoking the backend.
    #[error("circuit open, retry in {remaining_secs}s")]
    CircuitOpen {
        /// Seconds until the breaker admits a trial call.
        remaining_secs: u64,
    },

    /// The downstream execution ran and failed. Spend was not committed.
    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),
}

/// Read-only snapshot for dashboards and health checks.
#[derive(Debug, Clone, Serialize)]
pub struct GateStatus {
    pub ledger: LedgerUtilization,
    pub breaker_state: BreakerState,
    pub emergency_stop_active: bool,
    pub drawdown_pct: Decimal,
    pub recent_violation_count: usize,
    pub metrics: MetricsSnapshot,
}

/// The policy-gated trade authorization engine.
pub struct AuthorizationEngine {
    config: GateConfig,
    policy: PolicyEngine,
    ledger: Arc<SpendingLedger>,
    frequency: Arc<FrequencyGuard>,
    cache: PermissionCache,
    breaker: CircuitBreaker,
    safety: SafetyMonitor,
    executor: Arc<dyn TradeExecutor>,
    metrics: GateMetrics,
}

impl AuthorizationEngine {
    /// Builds the engine from configuration and a downstream executor.
    ///
    /// All gate state starts zeroed: empty ledger windows, no recent trades,
    /// a closed breaker, and no stop engaged.
    #[must_use]
    pub fn new(config: GateConfig, executor: Arc<dyn TradeExecutor>) -> Self {
        let now = chrono::Utc::now();
        let ledger = Arc::new(SpendingLedger::new(&config.spending, now));
        let frequency = Arc::new(FrequencyGuard::new(config.frequency.clone()));
        let policy = PolicyEngine::new(
            Arc::clone(&ledger),
            Arc::clone(&frequency),
            AssetAllowlist::new(&config.assets),
            TradingWindow::new(&config.window),
        );
        let cache = PermissionCache::new(config.cache.clone());
        let breaker = CircuitBreaker::new(config.breaker.clone());
        let safety = SafetyMonitor::new(config.safety.clone());
        info!(
            per_trade_limit = %config.spending.per_trade_limit,
            failure_threshold = config.breaker.failure_threshold,
            "authorization engine started"
        );
        Self {
            config,
            policy,
            ledger,
            frequency,
            cache,
            breaker,
            safety,
            executor,
            metrics: GateMetrics::new(),
        }
    }

    /// Authorizes and (when permitted) executes a proposed trade.
    ///
    /// # Errors
    ///
    /// `AuthorizeError::CircuitOpen` when the breaker rejected the call;
    /// `AuthorizeError::Execution` when the downstream call failed or timed
    /// out. In both cases no spend is committed and the breaker has absorbed
    /// the event.
    pub async fn authorize(
        &self,
        request: &TradeRequest,
    ) -> Result<AuthorizationOutcome, AuthorizeError> {
        let now = request.requested_at;
        self.metrics.record_request();

        // 1. Emergency stop bypasses everything else.
        if self.safety.is_stopped() {
            warn!(pair = %request.pair, "authorization denied: emergency stop active");
            self.metrics.record_emergency_rejection(now);
            let verdict = PolicyVerdict::deny(
                Violation::new(
                    ViolationKind::EmergencyStopActive,
                    "trading halted by emergency stop",
                ),
                now,
            );
            return Ok(AuthorizationOutcome {
                verdict,
                cached: false,
                execution: None,
            });
        }

        // 2. A cached allow-verdict is returned directly.
        if let Some(verdict) = self.cache.get(request) {
            self.metrics.record_cache_hit();
            return Ok(AuthorizationOutcome {
                verdict,
                cached: true,
                execution: None,
            });
        }

        // 3. Fresh precheck. A denial never touches the ledger.
        let verdict = self.policy.precheck(request, false);
        if !verdict.allowed {
            self.metrics.record_denied(now, verdict.violations.len());
            return Ok(AuthorizationOutcome {
                verdict,
                cached: false,
                execution: None,
            });
        }
        self.metrics.record_allowed();

        // 4. Execute through the breaker with the configured timeout.
        let timeout = self.config.execution.timeout;
        let executor = Arc::clone(&self.executor);
        let result = self
            .breaker
            .call(async {
                match tokio::time::timeout(timeout, executor.execute(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(ExecutionError::Timeout {
                        timeout_secs: timeout.as_secs(),
                    }),
                }
            })
            .await;

        match result {
            Ok(report) => {
                // Commit is the atomic point of no return: ledger first,
                // then frequency, cache, safety, metrics.
                self.ledger.commit(report.executed_amount, now);
                self.frequency.record(request);
                self.cache.put(request, &verdict);
                self.safety.record_outcome(report.pnl);
                self.metrics.record_execution();
                info!(
                    pair = %request.pair,
                    amount = %report.executed_amount,
                    pnl = %report.pnl,
                    "trade authorized and executed"
                );
                Ok(AuthorizationOutcome {
                    verdict,
                    cached: false,
                    execution: Some(report),
                })
            }
            Err(BreakerError::Open(open)) => {
                self.metrics.record_breaker_rejection();
                warn!(
                    remaining_secs = open.remaining_secs,
                    "execution rejected: circuit open"
                );
                Err(AuthorizeError::CircuitOpen {
                    remaining_secs: open.remaining_secs,
                })
            }
            Err(BreakerError::Inner(err)) => {
                self.metrics.record_execution_failure(err.is_timeout());
                warn!(pair = %request.pair, error = %err, "execution failed, no spend committed");
                Err(AuthorizeError::Execution(err))
            }
        }
    }

    /// Operator override: halt all trading.
    pub fn emergency_stop(&self, reason: impl Into<String>) {
        self.safety.emergency_stop(reason);
    }

    /// Operator override: resume trading after a stop.
    pub fn resume_from_emergency_stop(&self, reason: impl Into<String>) {
        self.safety.resume(reason);
    }

    /// Read-only snapshot for dashboards and health checks.
    #[must_use]
    pub fn status(&self) -> GateStatus {
        let now = chrono::Utc::now();
        GateStatus {
            ledger: self.ledger.utilization(now),
            breaker_state: self.breaker.state(),
            emergency_stop_active: self.safety.is_stopped(),
            drawdown_pct: self.safety.drawdown_pct(),
            recent_violation_count: self.metrics.recent_violation_count(now),
            metrics: self.metrics.snapshot(),
        }
    }

    /// The shared spending ledger.
    #[must_use]
    pub fn ledger(&self) -> &SpendingLedger {
        &self.ledger
    }

    /// The shared frequency guard.
    #[must_use]
    pub fn frequency(&self) -> &FrequencyGuard {
        &self.frequency
    }

    /// The permission cache.
    #[must_use]
    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// The circuit breaker guarding execution.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The safety monitor.
    #[must_use]
    pub fn safety(&self) -> &SafetyMonitor {
        &self.safety
    }

    /// The metrics collector.
    #[must_use]
    pub fn metrics(&self) -> &GateMetrics {
        &self.metrics
    }
}
