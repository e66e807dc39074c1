//! Circuit breaker for the downstream execution call.
//!
//! Classic three-state breaker: `Closed` counts consecutive failures and
//! opens at the configured threshold; `Open` fails every call fast without
//! touching the downstream; once the cooldown elapses the breaker moves to
//! `HalfOpen` and admits exactly one trial call, whose outcome decides the
//! next state. The breaker reacts to infrastructure failures only; policy
//! checks never touch it.
//!
//! # Example
//!
//! ```
//! use trade_gate_guard::breaker::CircuitBreaker;
//! use trade_gate_core::config::BreakerConfig;
//!
//! let breaker = CircuitBreaker::new(BreakerConfig::default());
//! assert!(breaker.try_acquire().is_ok());
//! breaker.record_success();
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use trade_gate_core::config::BreakerConfig;
use tracing::{info, warn};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerState {
    /// Calls flow through; consecutive failures are counted.
    Closed,
    /// Calls fail fast until the cooldown elapses.
    Open,
    /// One trial call decides whether to close or re-open.
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        };
        f.write_str(label)
    }
}

/// Fast-fail error returned while the circuit is open (or a half-open trial
/// is already in flight).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("circuit open, retry in {remaining_secs}s")]
pub struct CircuitOpenError {
    /// Seconds until the next trial call will be admitted, rounded up.
    /// Zero only while a half-open trial is already in flight.
    pub remaining_secs: u64,
}

/// Error from a breaker-wrapped call.
#[derive(Debug, Error)]
pub enum BreakerError<E: std::error::Error> {
    /// The circuit rejected the call without invoking the downstream.
    #[error("{0}")]
    Open(#[from] CircuitOpenError),

    /// The downstream call ran and failed; the failure was counted.
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

/// Thread-safe three-state circuit breaker.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .finish()
    }
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Requests permission to make a downstream call.
    ///
    /// In `Open`, moves to `HalfOpen` once the cooldown has elapsed and
    /// admits the caller as the single trial; otherwise fails fast with the
    /// remaining cooldown. In `HalfOpen`, admits only the first caller until
    /// the trial resolves.
    ///
    /// Every `Ok(())` must be followed by exactly one `record_success` or
    /// `record_failure`.
    ///
    /// # Errors
    ///
    /// `CircuitOpenError` when the circuit rejects the call.
    pub fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = inner.opened_at.map_or(Duration::ZERO, |at| at.elapsed());
                if elapsed >= self.config.cooldown {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!("circuit half-open, admitting trial call");
                    Ok(())
                } else {
                    let remaining = self.config.cooldown - elapsed;
                    Err(CircuitOpenError {
                        remaining_secs: secs_ceil(remaining),
                    })
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    Err(CircuitOpenError { remaining_secs: 0 })
                } else {
                    inner.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Records a successful downstream call: the failure count resets and
    /// the circuit closes from any state.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != BreakerState::Closed {
            info!(from = %inner.state, "circuit closed");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    /// Records a failed downstream call.
    ///
    /// In `HalfOpen` the failed trial re-opens the circuit immediately; in
    /// `Closed` the counter increments and opens the circuit at the
    /// threshold.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure_at = Some(Instant::now());
        inner.trial_in_flight = false;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                warn!("trial call failed, circuit re-opened");
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        failures = inner.consecutive_failures,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "failure threshold reached, circuit opened"
                    );
                }
            }
            // Failures reported while already open (e.g. a straggler call
            // admitted before the transition) keep the circuit open.
            BreakerState::Open => {
                inner.consecutive_failures += 1;
            }
        }
    }

    /// Wraps a downstream call future in the breaker.
    ///
    /// Fails fast while open, otherwise awaits the future and lowers its
    /// outcome into the corresponding state transition.
    ///
    /// Cancellation safe: dropping the returned future after admission
    /// releases the trial slot without recording an outcome, so a cancelled
    /// half-open trial cannot lock the breaker.
    ///
    /// # Errors
    ///
    /// `BreakerError::Open` when the circuit rejected the call,
    /// `BreakerError::Inner` carrying the downstream error otherwise.
    pub async fn call<T, E, Fut>(&self, fut: Fut) -> Result<T, BreakerError<E>>
    where
        E: std::error::Error,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;
        let guard = CallGuard {
            breaker: self,
            armed: true,
        };
        match fut.await {
            Ok(value) => {
                guard.defuse();
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                guard.defuse();
                self.record_failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Releases the trial slot after an admitted call was dropped without
    /// resolving. The dropped call counts as neither success nor failure;
    /// the next `try_acquire` may admit a fresh trial.
    fn abandon_call(&self) {
        let mut inner = self.inner.lock();
        if inner.trial_in_flight {
            inner.trial_in_flight = false;
            warn!("admitted call dropped before resolving, trial slot released");
        }
    }

    /// Current state as stored (transitions happen on acquire/record).
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Current consecutive failure count.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Remaining cooldown while open, if any.
    #[must_use]
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        if inner.state != BreakerState::Open {
            return None;
        }
        let elapsed = inner.opened_at.map_or(Duration::ZERO, |at| at.elapsed());
        self.config.cooldown.checked_sub(elapsed)
    }
}

/// Whole seconds, rounded up so a sub-second remainder never reads as
/// "retry in 0s" while the circuit still rejects.
fn secs_ceil(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Releases an admitted call's trial slot if the wrapped future is dropped
/// before it resolves.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl CallGuard<'_> {
    fn defuse(mut self) {
        self.armed = false;
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_call();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            BreakerConfig::default()
                .with_failure_threshold(threshold)
                .with_cooldown(cooldown),
        )
    }

    // ==================== Transition Tests ====================

    #[test]
    fn test_starts_closed() {
        let breaker = breaker(3, Duration::from_secs(60));
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn test_opens_at_exactly_threshold_failures() {
        let breaker = breaker(3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn test_open_fails_fast_with_remaining_cooldown() {
        let breaker = breaker(1, Duration::from_secs(60));
        breaker.record_failure();

        let err = breaker.try_acquire().unwrap_err();
        assert!(err.remaining_secs <= 60);
        assert!(breaker.remaining_cooldown().is_some());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = breaker(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);

        // Two more failures still below threshold after the reset.
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_after_cooldown_admits_one_trial() {
        let breaker = breaker(1, Duration::from_millis(10));
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(20));

        // First acquire is the trial; a second concurrent acquire is
        // rejected until the trial resolves.
        assert!(breaker.try_acquire().is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.try_acquire().is_err());
    }

    #[test]
    fn test_trial_success_closes() {
        let breaker = breaker(1, Duration::from_millis(10));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));

        breaker.try_acquire().unwrap();
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn test_trial_failure_reopens() {
        let breaker = breaker(1, Duration::from_millis(10));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));

        breaker.try_acquire().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.try_acquire().is_err());
    }

    #[test]
    fn test_half_open_next_trial_allowed_after_resolution() {
        let breaker = breaker(1, Duration::from_millis(10));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));

        breaker.try_acquire().unwrap();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));

        // Cooldown elapsed again: a fresh trial is admitted.
        assert!(breaker.try_acquire().is_ok());
    }

    // ==================== Call Wrapper Tests ====================

    #[derive(Debug, Error)]
    #[error("downstream failed")]
    struct DownstreamError;

    #[tokio::test]
    async fn test_call_success_passes_value_through() {
        let breaker = breaker(3, Duration::from_secs(60));
        let result: Result<u32, BreakerError<DownstreamError>> =
            breaker.call(async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_open_breaker_does_not_invoke_downstream() {
        let breaker = breaker(1, Duration::from_secs(60));
        breaker.record_failure();

        // try_acquire is the gate `call` uses; while open it must reject
        // before ever constructing the downstream future.
        assert!(breaker.try_acquire().is_err());
    }

    #[tokio::test]
    async fn test_call_counts_failures_until_open() {
        let breaker = breaker(2, Duration::from_secs(60));

        for _ in 0..2 {
            let result: Result<u32, BreakerError<DownstreamError>> =
                breaker.call(async { Err(DownstreamError) }).await;
            assert!(matches!(result, Err(BreakerError::Inner(_))));
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        let result: Result<u32, BreakerError<DownstreamError>> =
            breaker.call(async { Ok(7) }).await;
        assert!(matches!(result, Err(BreakerError::Open(_))));
    }

    #[tokio::test]
    async fn test_dropped_trial_call_frees_the_breaker() {
        let breaker = breaker(1, Duration::from_millis(10));
        breaker.record_failure();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The trial call stalls and is cancelled before resolving.
        let result = tokio::time::timeout(
            Duration::from_millis(5),
            breaker.call(std::future::pending::<Result<u32, DownstreamError>>()),
        )
        .await;
        assert!(result.is_err());

        // The abandoned trial must not lock the breaker: a fresh trial is
        // admitted and can close the circuit.
        assert!(breaker.try_acquire().is_ok());
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_subsecond_cooldown_rounds_up_not_to_zero() {
        let breaker = breaker(1, Duration::from_millis(500));
        breaker.record_failure();

        let err = breaker.try_acquire().unwrap_err();
        assert_eq!(err.remaining_secs, 1);
    }

    // ==================== Thread Safety Tests ====================

    #[test]
    fn test_concurrent_failures_open_once() {
        use std::sync::Arc;
        use std::thread;

        let breaker = Arc::new(breaker(5, Duration::from_secs(60)));
        let mut handles = vec![];
        for _ in 0..10 {
            let b = Arc::clone(&breaker);
            handles.push(thread::spawn(move || b.record_failure()));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.consecutive_failures(), 10);
    }
}
