//! Trade request types shared across the gate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of a proposed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Returns the canonical uppercase label used in signatures and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error constructing a trade request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// Amount was zero or negative.
    #[error("trade amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Pair string was empty.
    #[error("trade pair must not be empty")]
    EmptyPair,
}

/// A proposed trade awaiting authorization.
///
/// Immutable once constructed: every component of the gate reads it, none
/// mutates it. `requested_at` is the timestamp all policy windows are
/// evaluated against, which keeps evaluation deterministic under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    /// Asset pair, e.g. "BTC/USD". Stored uppercased.
    pub pair: String,

    /// Buy or sell.
    pub side: TradeSide,

    /// Trade value in quote units. Always positive.
    pub amount: Decimal,

    /// When the caller proposed the trade.
    pub requested_at: DateTime<Utc>,
}

impl TradeRequest {
    /// Creates a validated trade request.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::NonPositiveAmount` if `amount <= 0`, or
    /// `RequestError::EmptyPair` if the pair string is empty.
    pub fn new(
        pair: impl Into<String>,
        side: TradeSide,
        amount: Decimal,
        requested_at: DateTime<Utc>,
    ) -> Result<Self, RequestError> {
        let pair: String = pair.into();
        if pair.trim().is_empty() {
            return Err(RequestError::EmptyPair);
        }
        if amount <= Decimal::ZERO {
            return Err(RequestError::NonPositiveAmount(amount));
        }
        Ok(Self {
            pair: pair.trim().to_uppercase(),
            side,
            amount,
            requested_at,
        })
    }

    /// Creates a request timestamped at the current instant.
    ///
    /// # Errors
    ///
    /// Same validation as [`TradeRequest::new`].
    pub fn now(
        pair: impl Into<String>,
        side: TradeSide,
        amount: Decimal,
    ) -> Result<Self, RequestError> {
        Self::new(pair, side, amount, Utc::now())
    }
}
