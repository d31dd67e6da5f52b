//! Oracle Cascade - tiered test-oracle acquisition for refactoring commits
//!
//! For every changed file of a refactoring commit the pipeline looks for a
//! test that exercises the behaviour shared by the pre- and post-refactoring
//! versions, trying increasingly expensive strategies until one succeeds:
//!
//! 1. existing tests found by naming convention at the commit,
//! 2. related tests found by relaxed matching over nearby history,
//! 3. tests generated by a search-based tool, then by a random tester.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): units, outcomes, the cascade state machine, ports
//! - **Application Layer** (`application`): the worker pool over a corpus
//! - **Service Layer** (`services`): tier handlers, orchestrator, aggregator
//! - **Infrastructure Layer** (`infrastructure`): config, logging, processes, git, corpus
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use oracle_cascade::application::{PipelineRunner, RunOptions};
//! use oracle_cascade::infrastructure::config::ConfigLoader;
//! use oracle_cascade::infrastructure::process::Cancellation;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load(None)?;
//!     let runner = PipelineRunner::from_config(config, Cancellation::never());
//!     let report = runner
//!         .run(&RunOptions {
//!             dataset: "refactorings.jsonl".into(),
//!             tier: None,
//!             limit: None,
//!             force: false,
//!         })
//!         .await?;
//!     println!("{} of {} units resolved", report.summary.resolved(), report.summary.total_units);
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{PipelineRunner, RunOptions, RunReport};
pub use domain::models::{
    CommitRecord, Config, FileChange, FinalStatus, Tier, TierOutcome, TierStatus, UnitId,
    UnitRecord, WorkUnit,
};
pub use domain::{CorpusError, PipelineError, PipelineResult, RepositoryError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{FinalSummary, ResultAggregator, TierOrchestrator};
