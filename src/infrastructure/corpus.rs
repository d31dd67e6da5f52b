//! JSON Lines corpus reader.
//!
//! One commit record per line. Blank lines are ignored; lines that do not
//! parse, are not UTF-8, or lack an identity field, are skipped and
//! reported. Reading the file itself is the only fatal failure.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::domain::errors::{CorpusError, PipelineError, PipelineResult};
use crate::domain::models::{CommitRecord, SkippedLine, WorkUnit};

/// A loaded corpus.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// Valid commit records in file order.
    pub records: Vec<CommitRecord>,
    /// Lines that were skipped.
    pub skipped: Vec<SkippedLine>,
}

impl Corpus {
    /// Read `path`, keeping at most `limit` commit records.
    pub async fn load(path: &Path, limit: Option<usize>) -> PipelineResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| PipelineError::DatasetUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::parse(&bytes, limit))
    }

    /// Parse JSON Lines content. Lines are decoded one at a time.
    pub fn parse(content: impl AsRef<[u8]>, limit: Option<usize>) -> Self {
        let mut corpus = Self::default();
        for (index, raw) in content.as_ref().split(|b| *b == b'\n').enumerate() {
            if limit.is_some_and(|max| corpus.records.len() >= max) {
                break;
            }
            let line = index + 1;
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if raw.trim_ascii().is_empty() {
                continue;
            }
            match decode_line(raw, line).and_then(|text| parse_line(text, line)) {
                Ok(record) => corpus.records.push(record),
                Err(e) => {
                    warn!(line, error = %e, "Skipping corpus line");
                    corpus.skipped.push(SkippedLine {
                        line: e.line(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        debug!(
            records = corpus.records.len(),
            skipped = corpus.skipped.len(),
            "Corpus parsed"
        );
        corpus
    }

    /// Work units of every record, first occurrence of each identity wins.
    pub fn units(&self) -> Vec<WorkUnit> {
        let mut seen = HashSet::new();
        let mut units = Vec::new();
        for unit in self.records.iter().flat_map(CommitRecord::units) {
            if seen.insert(unit.id.clone()) {
                units.push(unit);
            } else {
                warn!(unit = %unit.id, "Duplicate unit in corpus; keeping the first occurrence");
            }
        }
        units
    }
}

fn decode_line(raw: &[u8], line: usize) -> Result<&str, CorpusError> {
    std::str::from_utf8(raw).map_err(|e| CorpusError::InvalidUtf8 {
        line,
        message: e.to_string(),
    })
}

fn parse_line(raw: &str, line: usize) -> Result<CommitRecord, CorpusError> {
    let record: CommitRecord =
        serde_json::from_str(raw).map_err(|e| CorpusError::InvalidJson {
            line,
            message: e.to_string(),
        })?;
    if record.project.trim().is_empty() {
        return Err(CorpusError::MissingField {
            line,
            field: "project",
        });
    }
    if record.commit_sha.trim().is_empty() {
        return Err(CorpusError::MissingField {
            line,
            field: "commit_sha",
        });
    }
    if record.files.iter().any(|f| f.file_name.trim().is_empty()) {
        return Err(CorpusError::MissingField {
            line,
            field: "file_name",
        });
    }
    Ok(record)
}
