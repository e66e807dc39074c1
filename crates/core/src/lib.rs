pub mod config;
pub mod config_loader;
pub mod traits;
pub mod types;
pub mod verdict;

pub use config::{
    AssetConfig, BreakerConfig, CacheConfig, ExecutionConfig, FrequencyConfig, GateConfig,
    SafetyConfig, SpendingConfig, WindowConfig,
};
pub use config_loader::ConfigLoader;
pub use traits::{ExecutionError, ExecutionReport, TradeExecutor};
pub use types::{RequestError, TradeRequest, TradeSide};
pub use verdict::{PolicyVerdict, Violation, ViolationKind};
