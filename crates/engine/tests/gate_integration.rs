//! End-to-end scenarios driving the full gate through the facade.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use trade_gate_core::config::GateConfig;
use trade_gate_core::types::{TradeRequest, TradeSide};
use trade_gate_core::verdict::ViolationKind;
use trade_gate_engine::{AuthorizationEngine, AuthorizeError, PaperExecutor};
use trade_gate_guard::breaker::BreakerState;

fn at(m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, m, s).unwrap()
}

fn request(amount: Decimal, when: DateTime<Utc>) -> TradeRequest {
    TradeRequest::new("BTC/USD", TradeSide::Buy, amount, when).unwrap()
}

fn engine_with(config: GateConfig) -> (AuthorizationEngine, Arc<PaperExecutor>) {
    let paper = Arc::new(PaperExecutor::new());
    let engine = AuthorizationEngine::new(config, paper.clone());
    (engine, paper)
}

/// Config with frequency spacing relaxed so scenarios control their own
/// pacing, and the cache narrowed so distinct requests stay distinct.
fn relaxed_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.frequency.min_spacing = Duration::ZERO;
    config.cache.ttl = Duration::from_secs(1);
    config
}

#[tokio::test]
async fn sixth_trade_within_a_minute_is_denied() {
    let (engine, _) = engine_with(relaxed_config());

    for i in 0..5u32 {
        let outcome = engine
            .authorize(&request(dec!(10), at(0, i * 10)))
            .await
            .unwrap();
        assert!(outcome.allowed(), "trade {i} should pass");
    }

    // Sixth trade inside the same rolling minute. Amount differs so the
    // cache does not short-circuit the precheck.
    let outcome = engine
        .authorize(&request(dec!(500), at(0, 55)))
        .await
        .unwrap();
    assert!(!outcome.allowed());
    assert!(outcome.verdict.has(ViolationKind::FrequencyLimitExceeded));
}

#[tokio::test]
async fn spend_accumulates_only_on_success() {
    let (engine, paper) = engine_with(relaxed_config());

    engine.authorize(&request(dec!(100), at(0, 0))).await.unwrap();
    engine.authorize(&request(dec!(250), at(1, 0))).await.unwrap();

    paper.push_failure("venue down");
    let err = engine
        .authorize(&request(dec!(400), at(2, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthorizeError::Execution(_)));

    // Two successes committed, the failure did not.
    assert_eq!(engine.ledger().hourly_spent(at(3, 0)), dec!(350));
    assert_eq!(engine.frequency().len(), 2);
}

#[tokio::test]
async fn breaker_opens_after_threshold_and_recovers() {
    let mut config = relaxed_config();
    config.breaker.failure_threshold = 2;
    config.breaker.cooldown = Duration::from_millis(30);
    let (engine, paper) = engine_with(config);

    paper.push_failure("fail 1");
    paper.push_failure("fail 2");
    assert!(engine.authorize(&request(dec!(10), at(0, 0))).await.is_err());
    assert!(engine.authorize(&request(dec!(20), at(0, 10))).await.is_err());
    assert_eq!(engine.breaker().state(), BreakerState::Open);

    // While open: fast-fail before the executor is ever invoked.
    let err = engine
        .authorize(&request(dec!(30), at(0, 20)))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthorizeError::CircuitOpen { .. }));
    assert_eq!(paper.pending(), 0);

    // After the cooldown the single trial call closes the circuit.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let outcome = engine
        .authorize(&request(dec!(40), at(0, 30)))
        .await
        .unwrap();
    assert!(outcome.allowed());
    assert_eq!(engine.breaker().state(), BreakerState::Closed);
}

#[tokio::test]
async fn drawdown_trips_emergency_stop_until_operator_resumes() {
    // Reference 10_000 and max drawdown 10%: -1_100 of realized losses trip.
    let (engine, paper) = engine_with(relaxed_config());

    paper.push_success(dec!(-600));
    paper.push_success(dec!(-500));
    engine.authorize(&request(dec!(100), at(0, 0))).await.unwrap();
    engine.authorize(&request(dec!(200), at(1, 0))).await.unwrap();
    assert!(engine.safety().is_stopped());

    // Everything is now denied up front, even trades that would pass every
    // other policy.
    let outcome = engine
        .authorize(&request(dec!(10), at(2, 0)))
        .await
        .unwrap();
    assert!(!outcome.allowed());
    assert!(outcome.verdict.has(ViolationKind::EmergencyStopActive));
    assert!(outcome.execution.is_none());

    engine.resume_from_emergency_stop("reviewed losses, resuming");
    let outcome = engine
        .authorize(&request(dec!(10), at(3, 0)))
        .await
        .unwrap();
    assert!(outcome.allowed());
}

#[tokio::test]
async fn denials_are_never_served_from_cache() {
    let (engine, _) = engine_with(relaxed_config());

    // Denied on the per-trade cap; nothing may be cached for it.
    let first = engine
        .authorize(&request(dec!(5000), at(0, 0)))
        .await
        .unwrap();
    assert!(!first.allowed());
    assert!(engine.cache().is_empty());

    // The identical request is re-evaluated fresh, not served cached.
    let second = engine
        .authorize(&request(dec!(5000), at(0, 10)))
        .await
        .unwrap();
    assert!(!second.allowed());
    assert!(!second.cached);
}

#[tokio::test]
async fn status_reflects_gate_activity() {
    let (engine, _) = engine_with(relaxed_config());

    // Wall-clock requests so the recent-violation window lines up with the
    // clock `status()` reads.
    let ok = TradeRequest::now("BTC/USD", TradeSide::Buy, dec!(100)).unwrap();
    let too_big = TradeRequest::now("BTC/USD", TradeSide::Buy, dec!(9999)).unwrap();
    engine.authorize(&ok).await.unwrap();
    engine.authorize(&too_big).await.unwrap();

    let status = engine.status();
    assert_eq!(status.metrics.requests, 2);
    assert_eq!(status.metrics.executions, 1);
    assert_eq!(status.metrics.denied, 1);
    assert_eq!(status.breaker_state, BreakerState::Closed);
    assert!(!status.emergency_stop_active);
    assert!(status.recent_violation_count >= 1);
}
