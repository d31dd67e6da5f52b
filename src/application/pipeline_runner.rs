//! Pipeline runner: the bounded worker pool over all units of a corpus.
//!
//! Uses tokio primitives for concurrency:
//! - a `Semaphore` sized to the worker count gates unit tasks
//! - a `JoinSet` owns the in-flight tasks
//! - a `watch`-backed [`Cancellation`] stops new units and kills running tools
//!
//! Every unit task allocates its own working directory, drives the unit
//! through the [`TierOrchestrator`], and hands the record to the shared
//! [`ResultAggregator`]. Reports are flushed on every exit path of the run,
//! including infrastructure failures and cancellation.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{Config, Tier, UnitRecord};
use crate::domain::ports::RepositoryProvider;
use crate::infrastructure::corpus::Corpus;
use crate::infrastructure::git::GitRepositoryProvider;
use crate::infrastructure::process::{CancelHandle, Cancellation, ProcessRunner};
use crate::infrastructure::workspace::UnitWorkspace;
use crate::services::aggregator::{FinalSummary, ResultAggregator, RunMetadata};
use crate::services::orchestrator::TierOrchestrator;
use crate::services::tiers::{standard_handlers, TierHandler};

/// What to run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// JSON Lines corpus.
    pub dataset: PathBuf,
    /// Run only this tier.
    pub tier: Option<Tier>,
    /// Process at most this many commit records.
    pub limit: Option<usize>,
    /// Re-execute units resolved by a previous run.
    pub force: bool,
}

/// Result of a completed (possibly cancelled) run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The flushed summary.
    pub summary: FinalSummary,
    /// Non-deterministic run facts.
    pub metadata: RunMetadata,
}

impl RunReport {
    /// Whether the operator interrupted the run.
    pub const fn cancelled(&self) -> bool {
        self.summary.cancelled
    }
}

/// Progress notifications for interactive front ends.
pub trait RunProgress: Send + Sync {
    /// `total` units are about to be processed.
    fn started(&self, _total: usize) {}

    /// A unit reached a terminal state.
    fn unit_finished(&self, _record: &UnitRecord) {}

    /// All workers have stopped.
    fn finished(&self) {}
}

/// A [`RunProgress`] that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl RunProgress for NoProgress {}

/// Drives a whole corpus through the cascade.
pub struct PipelineRunner {
    config: Config,
    handlers: Vec<Arc<dyn TierHandler>>,
    cancel: Cancellation,
    progress: Arc<dyn RunProgress>,
}

impl PipelineRunner {
    /// A runner with explicit tier handlers.
    pub fn new(config: Config, handlers: Vec<Arc<dyn TierHandler>>, cancel: Cancellation) -> Self {
        Self {
            config,
            handlers,
            cancel,
            progress: Arc::new(NoProgress),
        }
    }

    /// A runner with the git-backed lookup tiers and the two generators.
    pub fn from_config(config: Config, cancel: Cancellation) -> Self {
        let runner = ProcessRunner::new(cancel.clone());
        let repos: Arc<dyn RepositoryProvider> =
            Arc::new(GitRepositoryProvider::new(&config, runner.clone()));
        let handlers = standard_handlers(&config, repos, &runner);
        Self::new(config, handlers, cancel)
    }

    /// Report progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn RunProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// The effective configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run every unit of `options.dataset` and flush the reports.
    ///
    /// Returns an error only for infrastructure failures; the reports are
    /// flushed before such an error is returned.
    pub async fn run(&self, options: &RunOptions) -> PipelineResult<RunReport> {
        let mut metadata = RunMetadata::start(&options.dataset, self.config.workers, options.tier);

        let corpus = Corpus::load(&options.dataset, options.limit).await?;
        let carry = self.config.skip_resolved && !options.force;
        let corpus_units = corpus.units();
        let mut aggregator = ResultAggregator::open(&self.config.output_dir, carry).await?;
        let current: HashSet<_> = corpus_units.iter().map(|unit| unit.id.clone()).collect();
        aggregator.retain_carried(&current);
        let aggregator = Arc::new(aggregator);

        let work_dir = self.config.work_dir();
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|source| PipelineError::WorkspaceAllocation {
                path: work_dir.clone(),
                source,
            })?;

        let units: Vec<_> = corpus_units
            .into_iter()
            .filter(|unit| !aggregator.is_carried(&unit.id))
            .collect();
        info!(
            units = units.len(),
            carried = aggregator.carried_count(),
            skipped_lines = corpus.skipped.len(),
            workers = self.config.workers,
            tier = options.tier.map(|t| t.label()).unwrap_or("all"),
            "Starting run"
        );
        self.progress.started(units.len());

        let orchestrator = Arc::new(
            TierOrchestrator::new(
                self.handlers.iter().cloned(),
                self.config.retry.clone(),
                self.cancel.clone(),
            )
            .with_restriction(options.tier),
        );
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks: JoinSet<PipelineResult<()>> = JoinSet::new();
        let mut fatal: Option<PipelineError> = None;

        for unit in units {
            if let Some(Err(e)) = tasks.try_join_next().map(flatten_join) {
                fatal = Some(e);
                break;
            }
            let permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let orchestrator = Arc::clone(&orchestrator);
            let aggregator = Arc::clone(&aggregator);
            let progress = Arc::clone(&self.progress);
            let work_dir = work_dir.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let workspace = UnitWorkspace::allocate(&work_dir, &unit.id)?;
                let record = orchestrator
                    .process(&unit, workspace.path(), Some(aggregator.as_ref()))
                    .await;
                drop(workspace);
                progress.unit_finished(&record);
                aggregator.record_unit(record).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = flatten_join(joined) {
                error!(error = %e, "Unit task failed");
                if fatal.is_none() {
                    fatal = Some(e);
                }
            }
        }
        self.progress.finished();

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            warn!("Run cancelled; flushing reports for completed and in-flight units");
        }
        let summary = aggregator.finalize(corpus.skipped.clone(), cancelled).await?;
        metadata.finish(
            aggregator.processed_count().await,
            aggregator.carried_count(),
            cancelled,
        );
        aggregator.write_metadata(&metadata).await?;

        if let Some(e) = fatal {
            return Err(e);
        }
        Ok(RunReport { summary, metadata })
    }
}

fn flatten_join(joined: Result<PipelineResult<()>, tokio::task::JoinError>) -> PipelineResult<()> {
    joined.unwrap_or_else(|e| Err(PipelineError::UnitTaskFailed(e.to_string())))
}

/// Cancel the run on the first Ctrl-C.
pub fn cancel_on_ctrl_c(handle: CancelHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling run");
            handle.cancel();
        }
    })
}
