//! Oracle cascade CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use oracle_cascade::cli::{commands, handle_error, Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.json).await,
        Commands::Summary(args) => commands::summary::execute(args, cli.json).await,
    };

    result.unwrap_or_else(|err| handle_error(&err, cli.json))
}
