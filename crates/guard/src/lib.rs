pub mod breaker;
pub mod safety;

pub use breaker::{BreakerError, BreakerState, CircuitBreaker, CircuitOpenError};
pub use safety::{SafetyMonitor, SafetySnapshot, StopInfo};
