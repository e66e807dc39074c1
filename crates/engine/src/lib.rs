pub mod facade;
pub mod metrics;
pub mod paper;

pub use facade::{AuthorizationEngine, AuthorizationOutcome, AuthorizeError, GateStatus};
pub use metrics::{GateMetrics, MetricsSnapshot};
pub use paper::PaperExecutor;
