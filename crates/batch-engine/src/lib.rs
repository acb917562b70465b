pub mod broadcast;
pub mod collector;
pub mod engine;
pub mod metrics;
pub mod queue;
pub mod retry;

pub use broadcast::BroadcastOutcome;
pub use engine::{BatchConfig, BatchEngine};
pub use metrics::RunMetrics;
