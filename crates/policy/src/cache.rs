//! Permission cache for allow-verdicts.
//!
//! Memoizes recent allow-verdicts keyed by a normalized trade signature so
//! bursts of near-identical high-frequency requests collapse onto one entry
//! instead of re-running the pipeline. The signature buckets the amount and
//! the request time, which is a deliberate precision/speed trade-off:
//! callers must treat hits as advisory.
//!
//! Denials are never cached. A denial can become valid moments later (a
//! window resets, the emergency stop is lifted), so it must always be
//! re-evaluated fresh.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use trade_gate_core::config::CacheConfig;
use trade_gate_core::types::TradeRequest;
use trade_gate_core::verdict::PolicyVerdict;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    verdict: PolicyVerdict,
    cached_at: DateTime<Utc>,
}

/// Thread-safe TTL cache over allow-verdicts.
pub struct PermissionCache {
    config: CacheConfig,
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCache")
            .field("config", &self.config)
            .field("entries", &self.inner.lock().len())
            .finish()
    }
}

impl PermissionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Derives the normalized signature for a request.
    ///
    /// Amount is floored to the configured bucket and the request time to a
    /// coarse window, so e.g. amounts 151 and 159 two seconds apart map to
    /// the same key.
    #[must_use]
    pub fn signature(&self, request: &TradeRequest) -> String {
        let amount = bucket_amount(request.amount, self.config.amount_bucket);
        let bucket_secs = self.config.time_bucket.as_secs().max(1) as i64;
        let time_bucket = request.requested_at.timestamp().div_euclid(bucket_secs);
        format!(
            "{}:{}:{}:{}",
            request.pair,
            request.side.as_str(),
            amount,
            time_bucket
        )
    }

    /// Looks up a cached allow-verdict for the request.
    ///
    /// Expired entries count as misses and are removed on the spot.
    pub fn get(&self, request: &TradeRequest) -> Option<PolicyVerdict> {
        let signature = self.signature(request);
        let mut entries = self.inner.lock();
        let entry = entries.get(&signature)?;
        if self.expired(entry, request.requested_at) {
            entries.remove(&signature);
            debug!(%signature, "cache entry expired");
            return None;
        }
        debug!(%signature, "cache hit");
        Some(entry.verdict.clone())
    }

    /// Stores an allow-verdict for the request's signature.
    ///
    /// Denials are dropped: only `allowed == true` verdicts are ever cached.
    pub fn put(&self, request: &TradeRequest, verdict: &PolicyVerdict) {
        if !verdict.allowed {
            debug!(pair = %request.pair, "denial not cached");
            return;
        }

        let signature = self.signature(request);
        let mut entries = self.inner.lock();
        if entries.len() >= self.config.max_entries {
            self.sweep(&mut entries, request.requested_at);
        }
        entries.insert(
            signature,
            CacheEntry {
                verdict: verdict.clone(),
                cached_at: request.requested_at,
            },
        );
    }

    /// Number of live entries (including any not yet swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    fn expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let ttl = ChronoDuration::from_std(self.config.ttl).unwrap_or_default();
        now.signed_duration_since(entry.cached_at) > ttl
    }

    /// Evicts expired entries, then oldest-first until under the bound.
    fn sweep(&self, entries: &mut HashMap<String, CacheEntry>, now: DateTime<Utc>) {
        let before = entries.len();
        entries.retain(|_, entry| !self.expired(entry, now));

        while entries.len() >= self.config.max_entries {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.cached_at)
                .map(|(signature, _)| signature.clone())
            else {
                break;
            };
            entries.remove(&oldest);
        }
        debug!(evicted = before - entries.len(), "cache sweep");
    }
}

fn bucket_amount(amount: Decimal, bucket: Decimal) -> Decimal {
    if bucket <= Decimal::ZERO {
        return amount;
    }
    (amount / bucket).floor() * bucket
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use trade_gate_core::types::TradeSide;
    use trade_gate_core::verdict::{Violation, ViolationKind};

    fn at(m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, m, s).unwrap()
    }

    fn request(amount: Decimal, when: DateTime<Utc>) -> TradeRequest {
        TradeRequest::new("BTC/USD", TradeSide::Buy, amount, when).unwrap()
    }

    fn cache() -> PermissionCache {
        PermissionCache::new(CacheConfig::default())
    }

    // ==================== Signature Tests ====================

    #[test]
    fn test_near_identical_requests_share_signature() {
        let cache = cache();
        // Amounts in the same 10-unit bucket, times in the same 120s bucket.
        let a = cache.signature(&request(dec!(151), at(0, 10)));
        let b = cache.signature(&request(dec!(159), at(0, 50)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_amount_bucket_boundary_changes_signature() {
        let cache = cache();
        let a = cache.signature(&request(dec!(159), at(0, 10)));
        let b = cache.signature(&request(dec!(161), at(0, 10)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_side_distinguishes_signature() {
        let cache = cache();
        let buy = request(dec!(100), at(0, 10));
        let sell = TradeRequest::new("BTC/USD", TradeSide::Sell, dec!(100), at(0, 10)).unwrap();
        assert_ne!(cache.signature(&buy), cache.signature(&sell));
    }

    // ==================== Get/Put Tests ====================

    #[test]
    fn test_put_then_get_within_ttl() {
        let cache = cache();
        let req = request(dec!(100), at(0, 0));
        cache.put(&req, &PolicyVerdict::allow(at(0, 0)));

        let hit = cache.get(&request(dec!(105), at(0, 30)));
        assert!(hit.is_some());
        assert!(hit.unwrap().allowed);
    }

    #[test]
    fn test_denial_is_never_cached() {
        let cache = cache();
        let req = request(dec!(100), at(0, 0));
        let denial = PolicyVerdict::deny(
            Violation::new(ViolationKind::PerTradeLimitExceeded, "over"),
            at(0, 0),
        );
        cache.put(&req, &denial);

        assert!(cache.is_empty());
        assert!(cache.get(&req).is_none());
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_removed() {
        let cache = PermissionCache::new(CacheConfig::default().with_ttl(Duration::from_secs(30)));
        let req = request(dec!(100), at(0, 0));
        cache.put(&req, &PolicyVerdict::allow(at(0, 0)));

        // Within the same time bucket but past the TTL.
        let later = request(dec!(100), at(0, 45));
        assert!(cache.get(&later).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_different_time_bucket_misses() {
        let cache = cache();
        cache.put(&request(dec!(100), at(0, 0)), &PolicyVerdict::allow(at(0, 0)));

        // 3 minutes later: different 120s bucket, so a miss even though the
        // entry itself has not expired yet.
        assert!(cache.get(&request(dec!(100), at(3, 0))).is_none());
    }

    // ==================== Eviction Tests ====================

    #[test]
    fn test_sweep_evicts_oldest_when_full() {
        let cache = PermissionCache::new(CacheConfig::default().with_max_entries(3));
        for i in 0..3 {
            // Distinct amounts land in distinct buckets.
            let req = request(Decimal::from(100 * (i + 1)), at(0, i as u32));
            cache.put(&req, &PolicyVerdict::allow(at(0, i as u32)));
        }
        assert_eq!(cache.len(), 3);

        // A fourth insert forces the oldest entry out.
        cache.put(&request(dec!(900), at(0, 10)), &PolicyVerdict::allow(at(0, 10)));
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&request(dec!(100), at(0, 20))).is_none());
        assert!(cache.get(&request(dec!(900), at(0, 20))).is_some());
    }

    #[test]
    fn test_sweep_prefers_removing_expired_entries() {
        let cache = PermissionCache::new(
            CacheConfig::default()
                .with_max_entries(2)
                .with_ttl(Duration::from_secs(20)),
        );
        cache.put(&request(dec!(100), at(0, 0)), &PolicyVerdict::allow(at(0, 0)));
        cache.put(&request(dec!(200), at(0, 50)), &PolicyVerdict::allow(at(0, 50)));

        // First entry has expired by now; the sweep drops it rather than
        // the still-fresh second entry.
        cache.put(&request(dec!(300), at(0, 55)), &PolicyVerdict::allow(at(0, 55)));
        assert!(cache.get(&request(dec!(200), at(0, 59))).is_some());
        assert!(cache.get(&request(dec!(300), at(0, 59))).is_some());
    }
}
