//! Command-line interface
//!
//! - `run`: drive a corpus through the cascade and print the summary
//! - `summary`: render the summary of a previous run
//!
//! Every command honours the global `--json` flag.

pub mod commands;
pub mod output;
pub mod types;

use std::process::ExitCode;

pub use types::{Cli, Commands, RunArgs, SummaryArgs};

/// Print `err` with its cause chain and return the failure exit status.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> ExitCode {
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": causes,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err}", console::style("Error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    ExitCode::FAILURE
}
