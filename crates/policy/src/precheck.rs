//! Policy precheck pipeline.
//!
//! Runs the four independent checks (spending, frequency, time window,
//! asset allowlist) against a request and aggregates every violation into a
//! single verdict. The pipeline deliberately never short-circuits: a denied
//! trade lists every policy that would have blocked it, so audit logs show
//! the complete picture rather than whichever check happened to run first.
//!
//! The pipeline is the read-only gate. It mutates nothing; committing spend
//! and recording trades happens in the facade only after execution succeeds.

use std::sync::Arc;
use trade_gate_core::types::TradeRequest;
use trade_gate_core::verdict::{PolicyVerdict, Violation, ViolationKind};
use tracing::{debug, warn};

use crate::allowlist::AssetAllowlist;
use crate::frequency::FrequencyGuard;
use crate::ledger::SpendingLedger;
use crate::window::TradingWindow;

/// The four-policy precheck pipeline.
pub struct PolicyEngine {
    ledger: Arc<SpendingLedger>,
    frequency: Arc<FrequencyGuard>,
    allowlist: AssetAllowlist,
    window: TradingWindow,
}

impl PolicyEngine {
    /// Composes the pipeline over shared ledger and frequency state.
    ///
    /// The ledger and guard are shared with the facade, which commits to
    /// them after successful executions; the allowlist and window are
    /// immutable and owned here.
    #[must_use]
    pub fn new(
        ledger: Arc<SpendingLedger>,
        frequency: Arc<FrequencyGuard>,
        allowlist: AssetAllowlist,
        window: TradingWindow,
    ) -> Self {
        Self {
            ledger,
            frequency,
            allowlist,
            window,
        }
    }

    /// Evaluates every policy against the request.
    ///
    /// `emergency_stopped` is the safety monitor's current flag, passed in
    /// so the verdict also reports `EMERGENCY_STOP_ACTIVE` when the facade
    /// did not already short-circuit on it.
    ///
    /// Idempotent: two prechecks of the same request with no commit in
    /// between produce identical verdicts.
    pub fn precheck(&self, request: &TradeRequest, emergency_stopped: bool) -> PolicyVerdict {
        let now = request.requested_at;
        let mut violations: Vec<Violation> = Vec::new();

        // 1. Spending caps.
        let projection = self.ledger.projected(request.amount, now);
        violations.extend(projection.violations);

        // 2. Trade frequency.
        violations.extend(self.frequency.check(now));

        // 3. Trading window and emergency stop.
        if let Some(violation) = self.window.check(now) {
            violations.push(violation);
        }
        if emergency_stopped {
            violations.push(Violation::new(
                ViolationKind::EmergencyStopActive,
                "trading halted by emergency stop",
            ));
        }

        // 4. Asset allowlist.
        if let Some(violation) = self.allowlist.check(&request.pair) {
            violations.push(violation);
        }

        let verdict = PolicyVerdict::from_violations(violations, now);
        if verdict.allowed {
            debug!(pair = %request.pair, amount = %request.amount, "precheck passed");
        } else {
            warn!(
                pair = %request.pair,
                amount = %request.amount,
                violations = %verdict.kinds(),
                "precheck denied"
            );
        }
        verdict
    }
}
