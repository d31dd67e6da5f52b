//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::models::Tier;

#[derive(Parser, Debug)]
#[command(name = "oracle-cascade")]
#[command(about = "Tiered test-oracle acquisition for refactoring commits", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the cascade over a corpus of refactoring commits
    Run(RunArgs),

    /// Render the final summary of a previous run
    Summary(SummaryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// JSON Lines corpus of commit records
    #[arg(long, env = "ORACLE_CASCADE_DATASET")]
    pub dataset: PathBuf,

    /// Run only this tier (1, 2, 3a or 3b)
    #[arg(long)]
    pub tier: Option<Tier>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory for reports, artifacts and working directories
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Worker pool size
    #[arg(long)]
    pub workers: Option<usize>,

    /// Process at most this many commit records
    #[arg(long)]
    pub limit: Option<usize>,

    /// Re-run units already resolved in a previous run
    #[arg(long)]
    pub force: bool,

    /// Configuration file (defaults to ./oracle-cascade.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    /// Directory holding final_summary.json
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Configuration file (defaults to ./oracle-cascade.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List every unit, not only the counts
    #[arg(long)]
    pub units: bool,
}
