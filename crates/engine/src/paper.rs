//! Paper execution backend.
//!
//! Simulates fills locally with zero network calls, so the gate can be run
//! end to end without a real exchange. Outcomes are scriptable: push
//! failures or P&L-carrying fills onto the queue and they are consumed in
//! order; an empty queue fills at the requested amount with zero P&L.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::time::Duration;
use trade_gate_core::traits::{ExecutionError, ExecutionReport, TradeExecutor};
use trade_gate_core::types::TradeRequest;
use tracing::debug;

/// One scripted outcome.
#[derive(Debug, Clone)]
enum ScriptedFill {
    Success { pnl: Decimal },
    Failure(String),
    Hang(Duration),
}

/// Scriptable paper executor.
#[derive(Debug, Default)]
pub struct PaperExecutor {
    script: Mutex<VecDeque<ScriptedFill>>,
}

impl PaperExecutor {
    /// Creates an executor that fills every request with zero P&L.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next fill to succeed with the given realized P&L delta.
    pub fn push_success(&self, pnl: Decimal) {
        self.script.lock().push_back(ScriptedFill::Success { pnl });
    }

    /// Scripts the next fill to fail with a rejection.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script
            .lock()
            .push_back(ScriptedFill::Failure(message.into()));
    }

    /// Scripts the next fill to stall for `delay` before succeeding, for
    /// exercising the gate's execution timeout.
    pub fn push_hang(&self, delay: Duration) {
        self.script.lock().push_back(ScriptedFill::Hang(delay));
    }

    /// Scripted outcomes not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl TradeExecutor for PaperExecutor {
    async fn execute(&self, request: &TradeRequest) -> Result<ExecutionReport, ExecutionError> {
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(ScriptedFill::Failure(message)) => {
                debug!(pair = %request.pair, "paper execution scripted failure");
                Err(ExecutionError::Rejected(message))
            }
            Some(ScriptedFill::Hang(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(ExecutionReport {
                    executed_amount: request.amount,
                    pnl: Decimal::ZERO,
                    executed_at: Utc::now(),
                })
            }
            Some(ScriptedFill::Success { pnl }) => Ok(ExecutionReport {
                executed_amount: request.amount,
                pnl,
                executed_at: Utc::now(),
            }),
            None => Ok(ExecutionReport {
                executed_amount: request.amount,
                pnl: Decimal::ZERO,
                executed_at: Utc::now(),
            }),
        }
    }
}
