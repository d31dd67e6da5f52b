//! CLI integration tests
//!
//! Exercise the command layer against real output directories.

mod common;

use clap::Parser;
use oracle_cascade::cli::commands::summary;
use oracle_cascade::cli::{handle_error, Cli, Commands};
use oracle_cascade::domain::models::{FinalStatus, Tier, TierOutcome, UnitId, UnitRecord};
use oracle_cascade::services::ResultAggregator;

#[test]
fn test_summary_args_parse() {
    let cli = Cli::try_parse_from([
        "oracle-cascade",
        "summary",
        "--output-dir",
        "out",
        "--units",
        "--json",
    ])
    .unwrap();
    assert!(cli.json);
    let Commands::Summary(args) = cli.command else {
        panic!("expected summary");
    };
    assert!(args.units);
    assert_eq!(args.output_dir.unwrap().to_str(), Some("out"));
}

#[test]
fn test_run_requires_dataset() {
    temp_env::with_var_unset("ORACLE_CASCADE_DATASET", || {
        assert!(Cli::try_parse_from(["oracle-cascade", "run"]).is_err());
    });
}

#[test]
fn test_dataset_from_environment() {
    temp_env::with_var("ORACLE_CASCADE_DATASET", Some("env.jsonl"), || {
        let cli = Cli::try_parse_from(["oracle-cascade", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.dataset.to_str(), Some("env.jsonl"));
    });
}

#[tokio::test]
async fn test_summary_reads_a_finished_run() {
    let dir = common::temp_dir();
    let output_dir = dir.path().join("output");
    let aggregator = ResultAggregator::open(&output_dir, false).await.unwrap();
    aggregator
        .record_unit(UnitRecord {
            unit: UnitId::new("p", "abc123", "src/main/java/A.java"),
            attempts: vec![TierOutcome::success(Tier::Extracted, "abc123:ATest.java")],
            final_status: FinalStatus::Extracted,
            diagnostic: None,
        })
        .await
        .unwrap();
    aggregator.finalize(Vec::new(), false).await.unwrap();

    let args = oracle_cascade::cli::SummaryArgs {
        output_dir: Some(output_dir),
        config: None,
        units: true,
    };
    assert!(summary::execute(args, true).await.is_ok());
}

#[tokio::test]
async fn test_summary_without_a_run_fails() {
    let dir = common::temp_dir();
    let args = oracle_cascade::cli::SummaryArgs {
        output_dir: Some(dir.path().to_path_buf()),
        config: None,
        units: false,
    };
    let err = summary::execute(args, false).await.unwrap_err();
    assert!(err.to_string().contains("final_summary.json"));
    // Rendering the error never panics in either mode.
    let _ = handle_error(&err, true);
    let _ = handle_error(&err, false);
}
