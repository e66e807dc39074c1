//! Gate configuration.
//!
//! All limits and thresholds consumed by the policies, breaker, safety
//! monitor, and cache are supplied here at startup. Durations are serialized
//! as whole seconds so the TOML/env surface stays flat.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the authorization gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    pub spending: SpendingConfig,
    pub frequency: FrequencyConfig,
    pub assets: AssetConfig,
    pub window: WindowConfig,
    pub breaker: BreakerConfig,
    pub safety: SafetyConfig,
    pub cache: CacheConfig,
    pub execution: ExecutionConfig,
}

impl GateConfig {
    /// Preset with tighter limits for a cautious rollout: smaller spending
    /// caps, fewer trades per window, a hair-trigger breaker, and a 5%
    /// drawdown ceiling.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            spending: SpendingConfig {
                per_trade_limit: dec!(250),
                hourly_limit: dec!(1000),
                daily_limit: dec!(4000),
            },
            frequency: FrequencyConfig {
                max_per_minute: 2,
                max_per_hour: 10,
                min_spacing: Duration::from_secs(15),
                ..FrequencyConfig::default()
            },
            breaker: BreakerConfig {
                failure_threshold: 2,
                cooldown: Duration::from_secs(120),
            },
            safety: SafetyConfig {
                max_drawdown_pct: dec!(5),
                ..SafetyConfig::default()
            },
            ..Self::default()
        }
    }
}

// =============================================================================
// Spending
// =============================================================================

/// Spending caps enforced by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingConfig {
    /// Maximum value of a single trade.
    pub per_trade_limit: Decimal,

    /// Maximum cumulative spend per UTC hour.
    pub hourly_limit: Decimal,

    /// Maximum cumulative spend per UTC day.
    pub daily_limit: Decimal,
}

impl Default for SpendingConfig {
    fn default() -> Self {
        Self {
            per_trade_limit: dec!(1000),
            hourly_limit: dec!(5000),
            daily_limit: dec!(20000),
        }
    }
}

impl SpendingConfig {
    /// Builder method to set the per-trade limit.
    #[must_use]
    pub fn with_per_trade_limit(mut self, limit: Decimal) -> Self {
        self.per_trade_limit = limit;
        self
    }

    /// Builder method to set the hourly limit.
    #[must_use]
    pub fn with_hourly_limit(mut self, limit: Decimal) -> Self {
        self.hourly_limit = limit;
        self
    }

    /// Builder method to set the daily limit.
    #[must_use]
    pub fn with_daily_limit(mut self, limit: Decimal) -> Self {
        self.daily_limit = limit;
        self
    }
}

// =============================================================================
// Frequency
// =============================================================================

/// Trade frequency limits enforced by the frequency guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyConfig {
    /// Maximum trades inside any rolling 60 second window.
    pub max_per_minute: u32,

    /// Maximum trades inside any rolling one hour window.
    pub max_per_hour: u32,

    /// Minimum spacing between consecutive trades.
    #[serde(with = "duration_secs")]
    pub min_spacing: Duration,

    /// How long trade records are retained for counting.
    #[serde(with = "duration_secs")]
    pub lookback: Duration,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 5,
            max_per_hour: 30,
            min_spacing: Duration::from_secs(5),
            lookback: Duration::from_secs(60 * 60),
        }
    }
}

impl FrequencyConfig {
    /// Builder method to set the per-minute maximum.
    #[must_use]
    pub fn with_max_per_minute(mut self, max: u32) -> Self {
        self.max_per_minute = max;
        self
    }

    /// Builder method to set the per-hour maximum.
    #[must_use]
    pub fn with_max_per_hour(mut self, max: u32) -> Self {
        self.max_per_hour = max;
        self
    }

    /// Builder method to set the minimum inter-trade spacing.
    #[must_use]
    pub fn with_min_spacing(mut self, spacing: Duration) -> Self {
        self.min_spacing = spacing;
        self
    }
}

// =============================================================================
// Assets
// =============================================================================

/// Asset allowlist configuration.
///
/// The default is fail-closed: an empty allowlist with `allow_unknown =
/// false` denies every pair. Set `allow_unknown = true` to deliberately run
/// the allowlist as an optional policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Pairs permitted for trading, e.g. `["BTC/USD", "ETH/USD"]`.
    pub allowed_pairs: Vec<String>,

    /// When true, each leg of a pair must appear in some allowlisted pair.
    pub strict_legs: bool,

    /// When true, pairs absent from the allowlist are permitted.
    pub allow_unknown: bool,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            allowed_pairs: vec!["BTC/USD".to_string(), "ETH/USD".to_string()],
            strict_legs: false,
            allow_unknown: false,
        }
    }
}

impl AssetConfig {
    /// Builder method to set the allowed pairs.
    #[must_use]
    pub fn with_allowed_pairs(mut self, pairs: Vec<String>) -> Self {
        self.allowed_pairs = pairs;
        self
    }

    /// Builder method to enable strict per-leg checking.
    #[must_use]
    pub fn with_strict_legs(mut self, strict: bool) -> Self {
        self.strict_legs = strict;
        self
    }
}

// =============================================================================
// Trading window
// =============================================================================

/// Bounds of the active trading window.
///
/// `None` on either side means the window is deliberately unbounded in that
/// direction (e.g. no fixed competition end date).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Earliest instant trading is permitted.
    pub opens_at: Option<DateTime<Utc>>,

    /// Latest instant trading is permitted.
    pub closes_at: Option<DateTime<Utc>>,
}

impl WindowConfig {
    /// Builder method to set the window bounds.
    #[must_use]
    pub fn with_bounds(
        mut self,
        opens_at: Option<DateTime<Utc>>,
        closes_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.opens_at = opens_at;
        self.closes_at = closes_at;
        self
    }
}

// =============================================================================
// Circuit breaker
// =============================================================================

/// Circuit breaker thresholds for the downstream execution call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before allowing a trial call.
    #[serde(with = "duration_secs")]
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    /// Builder method to set the failure threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Builder method to set the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

// =============================================================================
// Safety monitor
// =============================================================================

/// Drawdown limits for the safety monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Drawdown percentage that triggers the emergency stop.
    pub max_drawdown_pct: Decimal,

    /// Reference portfolio value that loss percentages are computed against.
    pub reference_value: Decimal,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_drawdown_pct: dec!(10),
            reference_value: dec!(10000),
        }
    }
}

impl SafetyConfig {
    /// Builder method to set the maximum drawdown percentage.
    #[must_use]
    pub fn with_max_drawdown_pct(mut self, pct: Decimal) -> Self {
        self.max_drawdown_pct = pct;
        self
    }

    /// Builder method to set the reference portfolio value.
    #[must_use]
    pub fn with_reference_value(mut self, value: Decimal) -> Self {
        self.reference_value = value;
        self
    }
}

// =============================================================================
// Permission cache
// =============================================================================

/// Permission cache tuning.
///
/// The TTL must stay shorter than the policy windows it shadows so a stale
/// allow-verdict is bounded in how far it can drift from ledger reality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a cached allow-verdict stays valid.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,

    /// Amounts are floored to a multiple of this bucket when deriving the
    /// cache signature.
    pub amount_bucket: Decimal,

    /// Request timestamps are floored to a multiple of this bucket when
    /// deriving the cache signature.
    #[serde(with = "duration_secs")]
    pub time_bucket: Duration,

    /// Entry count that triggers an eviction sweep.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            amount_bucket: dec!(10),
            time_bucket: Duration::from_secs(120),
            max_entries: 256,
        }
    }
}

impl CacheConfig {
    /// Builder method to set the TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Builder method to set the entry bound.
    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }
}

// =============================================================================
// Execution
// =============================================================================

/// Downstream execution call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Timeout applied to every execution call. A timeout counts as a
    /// breaker failure and never commits spend.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// Serde support for Duration
// =============================================================================

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = GateConfig::default();

        assert_eq!(config.spending.per_trade_limit, dec!(1000));
        assert_eq!(config.spending.hourly_limit, dec!(5000));
        assert_eq!(config.spending.daily_limit, dec!(20000));
        assert_eq!(config.frequency.max_per_minute, 5);
        assert_eq!(config.frequency.max_per_hour, 30);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.cooldown, Duration::from_secs(60));
        assert_eq!(config.safety.max_drawdown_pct, dec!(10));
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert!(!config.assets.allow_unknown);
    }

    #[test]
    fn test_builder_methods() {
        let spending = SpendingConfig::default()
            .with_per_trade_limit(dec!(500))
            .with_hourly_limit(dec!(2000))
            .with_daily_limit(dec!(8000));
        assert_eq!(spending.per_trade_limit, dec!(500));
        assert_eq!(spending.hourly_limit, dec!(2000));
        assert_eq!(spending.daily_limit, dec!(8000));

        let breaker = BreakerConfig::default()
            .with_failure_threshold(5)
            .with_cooldown(Duration::from_secs(30));
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_duration_round_trips_as_secs() {
        let config = BreakerConfig::default().with_cooldown(Duration::from_secs(90));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"cooldown\":90"));

        let back: BreakerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cooldown, Duration::from_secs(90));
    }

    #[test]
    fn test_conservative_preset_tightens_everything() {
        let config = GateConfig::conservative();
        assert!(config.spending.per_trade_limit < dec!(1000));
        assert_eq!(config.frequency.max_per_minute, 2);
        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.safety.max_drawdown_pct, dec!(5));
        // Untouched sections keep their defaults.
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_window_defaults_unbounded() {
        let window = WindowConfig::default();
        assert!(window.opens_at.is_none());
        assert!(window.closes_at.is_none());
    }
}
