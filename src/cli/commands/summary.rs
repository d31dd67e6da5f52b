//! `summary`: render the final summary of a previous run.

use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::types::SummaryArgs;
use crate::infrastructure::config::ConfigLoader;
use crate::services::aggregator::{FinalSummary, SUMMARY_FILE};

#[derive(Debug, Serialize)]
pub struct SummaryOutput {
    #[serde(flatten)]
    pub summary: FinalSummary,
    #[serde(skip)]
    pub show_units: bool,
}

impl CommandOutput for SummaryOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let mut out = formatter.format_summary(&self.summary);
        if self.show_units && !self.summary.records.is_empty() {
            out.push('\n');
            out.push_str(&formatter.format_records(&self.summary.records));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.summary).unwrap_or_default()
    }
}

/// Render the summary of a finished run.
pub async fn execute(args: SummaryArgs, json_mode: bool) -> Result<ExitCode> {
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => ConfigLoader::load(args.config.as_deref())?.output_dir,
    };
    let summary = FinalSummary::load(&output_dir)
        .await?
        .with_context(|| format!("No {SUMMARY_FILE} under {}", output_dir.display()))?;

    output(
        &SummaryOutput {
            summary,
            show_units: args.units,
        },
        json_mode,
    );
    Ok(ExitCode::SUCCESS)
}
