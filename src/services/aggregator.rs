//! Result aggregation and reporting.
//!
//! Streaming files under `<output>/reports/` grow while the run is in
//! flight; [`ResultAggregator::finalize`] writes the deterministic per-tier
//! reports and `final_summary.json` once the pool has drained.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::orchestrator::AttemptObserver;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{
    FinalStatus, SkippedLine, Tier, TierOutcome, UnitId, UnitRecord, WorkUnit,
};

/// Name of the cross-tier summary in the output directory.
pub const SUMMARY_FILE: &str = "final_summary.json";
/// Name of the non-deterministic run facts in the output directory.
pub const METADATA_FILE: &str = "run_metadata.json";
const UNITS_STREAM: &str = "units.jsonl";

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One line of a per-tier report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierReportEntry {
    /// Unit identity.
    pub unit: UnitId,
    /// The attempt.
    pub outcome: TierOutcome,
}

/// Contents of `final_summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSummary {
    /// Number of units in the summary (processed plus carried over).
    pub total_units: usize,
    /// Units per terminal status; every status is present.
    pub counts: BTreeMap<FinalStatus, usize>,
    /// Units without a usable test.
    pub exhausted: usize,
    /// Test methods backing resolved units, per resolving tier.
    pub test_methods: BTreeMap<Tier, usize>,
    /// Input lines that were not processed.
    #[serde(default)]
    pub skipped_lines: Vec<SkippedLine>,
    /// Whether the run was interrupted.
    #[serde(default)]
    pub cancelled: bool,
    /// Every unit's record, sorted by identity.
    pub records: Vec<UnitRecord>,
}

impl FinalSummary {
    /// Summarize `records`; the order of the input does not matter.
    pub fn build(
        records: impl IntoIterator<Item = UnitRecord>,
        skipped_lines: Vec<SkippedLine>,
        cancelled: bool,
    ) -> Self {
        let mut records: Vec<UnitRecord> = records.into_iter().collect();
        records.sort_by(|a, b| a.unit.cmp(&b.unit));

        let mut counts: BTreeMap<FinalStatus, usize> =
            FinalStatus::ALL.iter().map(|status| (*status, 0)).collect();
        let mut test_methods: BTreeMap<Tier, usize> =
            Tier::CASCADE.iter().map(|tier| (*tier, 0)).collect();
        for record in &records {
            *counts.entry(record.final_status).or_default() += 1;
            if let Some(winner) = record.winning_outcome() {
                *test_methods.entry(winner.tier).or_default() += winner.test_method_count();
            }
        }

        Self {
            total_units: records.len(),
            exhausted: counts.get(&FinalStatus::Exhausted).copied().unwrap_or_default(),
            counts,
            test_methods,
            skipped_lines,
            cancelled,
            records,
        }
    }

    /// Units that obtained a test oracle.
    pub fn resolved(&self) -> usize {
        self.total_units - self.exhausted
    }

    /// Read a summary written by a previous run.
    pub async fn load(output_dir: &Path) -> PipelineResult<Option<Self>> {
        let path = output_dir.join(SUMMARY_FILE);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PipelineError::ReportWrite {
                    path,
                    reason: format!("cannot read: {e}"),
                });
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| PipelineError::ReportWrite {
                path,
                reason: format!("not a summary: {e}"),
            })
    }
}

/// Contents of `run_metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Random identifier of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the reports were flushed.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in seconds.
    pub elapsed_secs: f64,
    /// Worker pool size.
    pub workers: usize,
    /// Corpus the run read.
    pub dataset: PathBuf,
    /// Single-tier restriction, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    /// Units executed in this run.
    pub units_processed: usize,
    /// Units carried over from a previous summary.
    pub units_carried: usize,
    /// Whether the run was interrupted.
    pub cancelled: bool,
}

impl RunMetadata {
    /// Metadata for a run that started now.
    pub fn start(dataset: &Path, workers: usize, tier: Option<Tier>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            elapsed_secs: 0.0,
            workers,
            dataset: dataset.to_path_buf(),
            tier,
            units_processed: 0,
            units_carried: 0,
            cancelled: false,
        }
    }

    /// Stamp the end of the run.
    #[allow(clippy::cast_precision_loss)]
    pub fn finish(&mut self, units_processed: usize, units_carried: usize, cancelled: bool) {
        self.finished_at = Utc::now();
        self.elapsed_secs =
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.units_processed = units_processed;
        self.units_carried = units_carried;
        self.cancelled = cancelled;
    }
}

// ---------------------------------------------------------------------------
// ResultAggregator
// ---------------------------------------------------------------------------

/// Collects unit records from all workers and persists reports.
pub struct ResultAggregator {
    output_dir: PathBuf,
    reports_dir: PathBuf,
    carried: BTreeMap<UnitId, UnitRecord>,
    records: Mutex<BTreeMap<UnitId, UnitRecord>>,
}

impl ResultAggregator {
    /// Prepare `output_dir` for a new run.
    ///
    /// With `carry_resolved`, resolved records of a previous
    /// `final_summary.json` are carried into this run's reports and their
    /// units are not executed again. Streaming files always start empty.
    pub async fn open(output_dir: &Path, carry_resolved: bool) -> PipelineResult<Self> {
        let reports_dir = output_dir.join("reports");
        tokio::fs::create_dir_all(&reports_dir)
            .await
            .map_err(|source| PipelineError::OutputUnwritable {
                path: reports_dir.clone(),
                source,
            })?;

        let mut carried = BTreeMap::new();
        if carry_resolved {
            match FinalSummary::load(output_dir).await {
                Ok(Some(prior)) => {
                    carried.extend(
                        prior
                            .records
                            .into_iter()
                            .filter(|r| r.final_status.is_resolved())
                            .map(|r| (r.unit.clone(), r)),
                    );
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Ignoring unreadable previous summary"),
            }
            if !carried.is_empty() {
                info!(units = carried.len(), "Carrying resolved units from previous run");
            }
        }

        let stream_files = Tier::CASCADE
            .iter()
            .map(|tier| format!("{}.jsonl", tier.report_name()))
            .chain(std::iter::once(UNITS_STREAM.to_string()));
        for name in stream_files {
            let path = reports_dir.join(name);
            tokio::fs::write(&path, b"")
                .await
                .map_err(|source| PipelineError::OutputUnwritable { path, source })?;
        }

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            reports_dir,
            carried,
            records: Mutex::new(BTreeMap::new()),
        })
    }

    /// Directory holding the per-tier reports.
    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Whether `unit` was resolved by a previous run and is carried over.
    pub fn is_carried(&self, unit: &UnitId) -> bool {
        self.carried.contains_key(unit)
    }

    /// Number of carried-over units.
    pub fn carried_count(&self) -> usize {
        self.carried.len()
    }

    /// Drop carried records whose unit is not in `current`.
    ///
    /// Called once the corpus is loaded, before any worker starts.
    pub fn retain_carried(&mut self, current: &HashSet<UnitId>) {
        let before = self.carried.len();
        self.carried.retain(|unit, _| current.contains(unit));
        let dropped = before - self.carried.len();
        if dropped > 0 {
            info!(dropped, "Dropping carried units absent from the dataset");
        }
    }

    /// Number of units recorded in this run.
    pub async fn processed_count(&self) -> usize {
        self.records.lock().await.len()
    }

    async fn append(path: &Path, line: &str) -> PipelineResult<()> {
        let write = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        };
        write.await.map_err(|e| PipelineError::ReportWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn to_json_line<T: Serialize>(path: &Path, value: &T) -> PipelineResult<String> {
        serde_json::to_string(value).map_err(|e| PipelineError::ReportWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Stream one tier attempt to `<tier>.jsonl`.
    pub async fn record_attempt(&self, unit: &UnitId, outcome: &TierOutcome) -> PipelineResult<()> {
        let path = self
            .reports_dir
            .join(format!("{}.jsonl", outcome.tier.report_name()));
        let entry = TierReportEntry {
            unit: unit.clone(),
            outcome: outcome.clone(),
        };
        let line = Self::to_json_line(&path, &entry)?;
        let _guard = self.records.lock().await;
        Self::append(&path, &line).await
    }

    /// Stream a finished unit to `units.jsonl` and keep it for the final reports.
    pub async fn record_unit(&self, record: UnitRecord) -> PipelineResult<()> {
        let path = self.reports_dir.join(UNITS_STREAM);
        let line = Self::to_json_line(&path, &record)?;
        let mut records = self.records.lock().await;
        Self::append(&path, &line).await?;
        records.insert(record.unit.clone(), record);
        Ok(())
    }

    async fn write_json<T: Serialize>(path: &Path, value: &T) -> PipelineResult<()> {
        let report_error = |reason: String| PipelineError::ReportWrite {
            path: path.to_path_buf(),
            reason,
        };
        let mut json = serde_json::to_string_pretty(value).map_err(|e| report_error(e.to_string()))?;
        json.push('\n');
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, json)
            .await
            .map_err(|e| report_error(e.to_string()))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| report_error(e.to_string()))
    }

    /// Write the deterministic per-tier reports and the final summary.
    pub async fn finalize(
        &self,
        skipped_lines: Vec<SkippedLine>,
        cancelled: bool,
    ) -> PipelineResult<FinalSummary> {
        let mut merged = self.carried.clone();
        merged.extend(
            self.records
                .lock()
                .await
                .iter()
                .map(|(id, record)| (id.clone(), record.clone())),
        );

        for tier in Tier::CASCADE {
            let entries: Vec<TierReportEntry> = merged
                .values()
                .flat_map(|record| {
                    record
                        .attempts
                        .iter()
                        .filter(move |outcome| outcome.tier == tier)
                        .map(move |outcome| TierReportEntry {
                            unit: record.unit.clone(),
                            outcome: outcome.clone(),
                        })
                })
                .collect();
            let path = self.reports_dir.join(format!("{}.json", tier.report_name()));
            Self::write_json(&path, &entries).await?;
        }

        let summary = FinalSummary::build(merged.into_values(), skipped_lines, cancelled);
        Self::write_json(&self.output_dir.join(SUMMARY_FILE), &summary).await?;
        info!(
            total = summary.total_units,
            resolved = summary.resolved(),
            exhausted = summary.exhausted,
            cancelled,
            "Reports written"
        );
        Ok(summary)
    }

    /// Write `run_metadata.json`.
    pub async fn write_metadata(&self, metadata: &RunMetadata) -> PipelineResult<()> {
        Self::write_json(&self.output_dir.join(METADATA_FILE), metadata).await
    }
}

#[async_trait]
impl AttemptObserver for ResultAggregator {
    async fn on_attempt(&self, unit: &WorkUnit, outcome: &TierOutcome) {
        if let Err(e) = self.record_attempt(&unit.id, outcome).await {
            warn!(unit = %unit.id, error = %e, "Failed to stream tier attempt");
        }
    }
}
