//! `run`: drive a corpus through the cascade.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::{cancel_on_ctrl_c, PipelineRunner, RunOptions, RunReport};
use crate::cli::output::{output, CommandOutput, TableFormatter, UnitProgress};
use crate::cli::types::RunArgs;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::infrastructure::process::Cancellation;
use crate::services::aggregator::{FinalSummary, RunMetadata};

/// Exit status after an operator-cancelled run whose reports were flushed.
pub const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub summary: FinalSummary,
    #[serde(skip)]
    pub metadata: RunMetadata,
}

impl From<RunReport> for RunOutput {
    fn from(report: RunReport) -> Self {
        Self {
            summary: report.summary,
            metadata: report.metadata,
        }
    }
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        format!(
            "Run {} finished in {:.1}s ({} processed, {} carried over)\n{}",
            self.metadata.run_id,
            self.metadata.elapsed_secs,
            self.metadata.units_processed,
            self.metadata.units_carried,
            formatter.format_summary(&self.summary)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.summary).unwrap_or_default()
    }
}

/// Apply command-line overrides on top of the loaded configuration.
pub fn apply_overrides(mut config: Config, args: &RunArgs) -> Result<Config> {
    if let Some(dir) = &args.output_dir {
        config.output_dir.clone_from(dir);
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.force {
        config.skip_resolved = false;
    }
    ConfigLoader::validate(&config).context("Invalid command-line overrides")?;
    Ok(config)
}

/// Run the cascade over a dataset.
pub async fn execute(args: RunArgs, json_mode: bool) -> Result<ExitCode> {
    let config = ConfigLoader::load(args.config.as_deref())?;
    let config = apply_overrides(config, &args)?;

    let log_config = LogConfig::from_settings(&config.logging, args.verbose)?;
    let _logger = LoggerImpl::init(&log_config)?;

    let (handle, cancel) = Cancellation::pair();
    let signal = cancel_on_ctrl_c(handle);

    let progress = Arc::new(UnitProgress::new(json_mode));
    let runner = PipelineRunner::from_config(config, cancel).with_progress(progress);
    let options = RunOptions {
        dataset: args.dataset.clone(),
        tier: args.tier,
        limit: args.limit,
        force: args.force,
    };

    let result = runner.run(&options).await;
    signal.abort();
    let report = result.with_context(|| format!("Run over {} failed", args.dataset.display()))?;

    let cancelled = report.cancelled();
    output(&RunOutput::from(report), json_mode);
    Ok(if cancelled {
        ExitCode::from(EXIT_CANCELLED)
    } else {
        ExitCode::SUCCESS
    })
}
