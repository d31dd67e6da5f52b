//! Common test utilities for integration tests
//!
//! Provides scripted tier handlers, corpus writers and a configuration rooted
//! in a temporary directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use oracle_cascade::domain::models::{
    CommitRecord, Config, FileChange, RetryConfig, Tier, TierOutcome, TierStatus, UnitId,
};
use oracle_cascade::services::tiers::{TierContext, TierHandler};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A configuration writing everything under `root`, with no retry backoff.
pub fn test_config(root: &Path) -> Config {
    Config {
        workers: 2,
        output_dir: root.join("output"),
        repos_dir: root.join("repos"),
        retry: RetryConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
        },
        ..Config::default()
    }
}

/// A well-formed change of a production Java file.
pub fn java_change(file_name: &str) -> FileChange {
    let type_name = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Foo")
        .to_string();
    FileChange {
        file_name: file_name.to_string(),
        before_source: format!("package org.x;\npublic class {type_name} {{ int a() {{ return 1; }} }}\n"),
        after_source: format!("package org.x;\npublic class {type_name} {{ int b() {{ return 1; }} }}\n"),
    }
}

/// A commit record with the given changes.
pub fn commit(project: &str, sha: &str, files: Vec<FileChange>) -> CommitRecord {
    CommitRecord {
        project: project.to_string(),
        commit_sha: sha.to_string(),
        files,
    }
}

/// Write `records` (plus any raw `extra` lines) as a JSON Lines corpus.
pub fn write_corpus(dir: &Path, records: &[CommitRecord], extra: &[&str]) -> PathBuf {
    let path = dir.join("corpus.jsonl");
    let mut lines: Vec<String> = records
        .iter()
        .map(|r| serde_json::to_string(r).expect("serialize record"))
        .collect();
    lines.extend(extra.iter().map(ToString::to_string));
    std::fs::write(&path, lines.join("\n") + "\n").expect("write corpus");
    path
}

type Script = dyn Fn(&TierContext<'_>) -> TierOutcome + Send + Sync;

/// A tier handler whose outcome is computed by a closure; counts its calls.
pub struct ScriptedTier {
    tier: Tier,
    retries: u32,
    script: Box<Script>,
    calls: AtomicUsize,
    seen: Mutex<Vec<UnitId>>,
}

impl ScriptedTier {
    pub fn new<F>(tier: Tier, script: F) -> Arc<Self>
    where
        F: Fn(&TierContext<'_>) -> TierOutcome + Send + Sync + 'static,
    {
        Arc::new(Self {
            tier,
            retries: 0,
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// A handler that always settles with `status`.
    pub fn always(tier: Tier, status: TierStatus) -> Arc<Self> {
        Self::new(tier, move |_| outcome(tier, status))
    }

    /// The same handler allowing `retries` extra attempts.
    pub fn with_retries<F>(tier: Tier, retries: u32, script: F) -> Arc<Self>
    where
        F: Fn(&TierContext<'_>) -> TierOutcome + Send + Sync + 'static,
    {
        Arc::new(Self {
            tier,
            retries,
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<UnitId> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TierHandler for ScriptedTier {
    fn tier(&self) -> Tier {
        self.tier
    }

    fn retries(&self) -> u32 {
        self.retries
    }

    async fn attempt(&self, ctx: &TierContext<'_>) -> TierOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(ctx.unit.id.clone());
        (self.script)(ctx)
    }
}

/// An outcome of `tier` with `status` and a generic diagnostic.
pub fn outcome(tier: Tier, status: TierStatus) -> TierOutcome {
    match status {
        TierStatus::Success => TierOutcome::success(tier, format!("artifact-{}", tier.label())),
        TierStatus::NoCandidate => TierOutcome::no_candidate(tier, "nothing found"),
        TierStatus::ToolFailure => TierOutcome::tool_failure(tier, "tool crashed"),
        TierStatus::Timeout => TierOutcome::timeout(tier, "budget exceeded"),
        TierStatus::CompileFailure => TierOutcome::compile_failure(tier, "1 compile error(s)"),
    }
}

/// Handlers for all four tiers, each settling with the matching status.
pub fn scripted_cascade(statuses: [TierStatus; 4]) -> Vec<Arc<ScriptedTier>> {
    Tier::CASCADE
        .iter()
        .zip(statuses)
        .map(|(tier, status)| ScriptedTier::always(*tier, status))
        .collect()
}

/// Upcast scripted handlers for the orchestrator and runner.
pub fn as_handlers(handlers: &[Arc<ScriptedTier>]) -> Vec<Arc<dyn TierHandler>> {
    handlers
        .iter()
        .map(|h| Arc::clone(h) as Arc<dyn TierHandler>)
        .collect()
}
