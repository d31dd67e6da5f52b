//! Domain errors for the oracle cascade.
//!
//! Only infrastructure failures are errors at run level. Tool failures are
//! data (see [`TierStatus`](crate::domain::models::TierStatus)) and corpus
//! problems are skipped per line.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal, run-level failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot read dataset {path}: {source}")]
    DatasetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write output directory {path}: {source}")]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot allocate working directory under {path}: {source}")]
    WorkspaceAllocation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write report {path}: {reason}")]
    ReportWrite { path: PathBuf, reason: String },

    #[error("Unit task failed: {0}")]
    UnitTaskFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// A corpus line that could not be turned into a commit record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorpusError {
    #[error("line {line}: invalid JSON: {message}")]
    InvalidJson { line: usize, message: String },

    #[error("line {line}: missing or empty field '{field}'")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: invalid UTF-8: {message}")]
    InvalidUtf8 { line: usize, message: String },
}

impl CorpusError {
    /// 1-based line number of the offending record.
    pub const fn line(&self) -> usize {
        match self {
            Self::InvalidJson { line, .. }
            | Self::MissingField { line, .. }
            | Self::InvalidUtf8 { line, .. } => *line,
        }
    }
}

/// Failures talking to a project repository.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("repository query failed: {0}")]
    QueryFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpus_error_reports_line() {
        let err = CorpusError::MissingField {
            line: 7,
            field: "commit_sha",
        };
        assert_eq!(err.line(), 7);
        assert_eq!(err.to_string(), "line 7: missing or empty field 'commit_sha'");
    }

    #[test]
    fn unit_task_failure_names_the_task() {
        let err = PipelineError::UnitTaskFailed("task 3 panicked".into());
        assert_eq!(err.to_string(), "Unit task failed: task 3 panicked");
    }

    #[test]
    fn pipeline_error_keeps_io_source() {
        let err = PipelineError::DatasetUnreadable {
            path: PathBuf::from("missing.jsonl"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("missing.jsonl"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
