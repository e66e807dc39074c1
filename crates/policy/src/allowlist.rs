//! Asset allowlist check.
//!
//! Fail-closed by default: a pair absent from the allowlist is denied unless
//! `allow_unknown` was deliberately enabled. Strict mode additionally
//! requires each leg of the pair to appear in some allowlisted pair, which
//! catches e.g. `BTC/DOGE` when only `BTC/USD` was permitted.

use std::collections::HashSet;
use trade_gate_core::config::AssetConfig;
use trade_gate_core::verdict::{Violation, ViolationKind};

/// Immutable allowlist built once from config.
#[derive(Debug, Clone)]
pub struct AssetAllowlist {
    pairs: HashSet<String>,
    legs: HashSet<String>,
    strict_legs: bool,
    allow_unknown: bool,
}

impl AssetAllowlist {
    /// Builds the allowlist, normalizing pairs to uppercase.
    #[must_use]
    pub fn new(config: &AssetConfig) -> Self {
        let pairs: HashSet<String> = config
            .allowed_pairs
            .iter()
            .map(|p| p.trim().to_uppercase())
            .collect();
        let legs = pairs
            .iter()
            .flat_map(|p| split_legs(p))
            .map(str::to_string)
            .collect();
        Self {
            pairs,
            legs,
            strict_legs: config.strict_legs,
            allow_unknown: config.allow_unknown,
        }
    }

    /// Checks a pair against the allowlist.
    ///
    /// Returns `None` when the pair is permitted, or the violation when not.
    /// The pair is expected uppercased (as `TradeRequest` stores it).
    #[must_use]
    pub fn check(&self, pair: &str) -> Option<Violation> {
        if self.strict_legs {
            for leg in split_legs(pair) {
                if !self.legs.contains(leg) {
                    return Some(Violation::new(
                        ViolationKind::AssetNotAllowed,
                        format!("asset {leg} of pair {pair} is not allowlisted"),
                    ));
                }
            }
            return None;
        }

        if self.pairs.contains(pair) || self.allow_unknown {
            return None;
        }

        Some(Violation::new(
            ViolationKind::AssetNotAllowed,
            format!("pair {pair} is not allowlisted"),
        ))
    }

    /// Number of allowlisted pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no pairs are allowlisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Splits a pair into its legs on `/` or `-`.
fn split_legs(pair: &str) -> impl Iterator<Item = &str> {
    pair.split(['/', '-']).filter(|leg| !leg.is_empty())
}
