//! Domain layer for the oracle cascade
//!
//! Units of work, tier outcomes, the cascade state machine, configuration
//! and the ports through which tiers reach project repositories.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{CorpusError, PipelineError, PipelineResult, RepositoryError};
