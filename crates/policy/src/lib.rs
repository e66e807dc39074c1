pub mod allowlist;
pub mod cache;
pub mod frequency;
pub mod ledger;
pub mod precheck;
pub mod window;

pub use allowlist::AssetAllowlist;
pub use cache::PermissionCache;
pub use frequency::{FrequencyGuard, RecentTrade};
pub use ledger::{LedgerUtilization, SpendProjection, SpendingLedger};
pub use precheck::PolicyEngine;
pub use window::TradingWindow;
