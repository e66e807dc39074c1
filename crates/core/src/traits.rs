//! The execution seam.
//!
//! The gate never talks to an exchange directly: it drives whatever
//! [`TradeExecutor`] it was handed, and treats every failure identically
//! (counted by the circuit breaker, never committing spend).

use crate::types::TradeRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of a successfully executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Amount actually executed (may be below the requested amount on a
    /// partial fill).
    pub executed_amount: Decimal,

    /// Realized P&L delta from this execution, fed to the safety monitor.
    /// Zero for a plain position-opening fill.
    pub pnl: Decimal,

    /// When the downstream confirmed the execution.
    pub executed_at: DateTime<Utc>,
}

/// Errors from the downstream execution backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// Backend rejected the trade.
    #[error("execution rejected: {0}")]
    Rejected(String),

    /// Network-level failure reaching the backend.
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded the configured execution timeout.
    #[error("execution timed out after {timeout_secs}s")]
    Timeout {
        /// The timeout that elapsed.
        timeout_secs: u64,
    },
}

impl ExecutionError {
    /// True for the timeout variant; used by metrics.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// The downstream trade execution collaborator.
///
/// Implementations must be safe to share across concurrent authorization
/// calls. The gate applies its own timeout around `execute`, so
/// implementations do not need one of their own.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn execute(&self, request: &TradeRequest) -> Result<ExecutionReport, ExecutionError>;
}
