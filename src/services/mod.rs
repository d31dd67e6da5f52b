pub mod aggregator;
pub mod java_source;
pub mod orchestrator;
pub mod tiers;

pub use aggregator::{FinalSummary, ResultAggregator, RunMetadata};
pub use orchestrator::TierOrchestrator;
pub use tiers::{TierContext, TierHandler};
