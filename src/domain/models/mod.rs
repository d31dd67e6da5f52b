pub mod cascade;
pub mod config;
pub mod outcome;
pub mod unit;

pub use cascade::{should_retry, CascadePlan, CascadeState, ExhaustReason};
pub use config::{
    BuildConfig, Config, DoubleCheckConfig, FallbackBudget, GeneratorConfig, GitConfig,
    LoggingConfig, RetryConfig, SeedPolicy, ValidationPolicy,
};
pub use outcome::{FinalStatus, TestEvidence, Tier, TierOutcome, TierStatus, UnitRecord};
pub use unit::{CommitRecord, FileChange, SkippedLine, UnitId, WorkUnit};
