//! Queries against a bare clone.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::RepositoryError;
use crate::domain::ports::SourceRepository;
use crate::infrastructure::process::{clip, ProcessOutcome, ProcessRunner, ToolCommand};

/// stderr fragments git prints when a path is absent at a commit.
const MISSING_PATH_MARKERS: [&str; 2] = ["does not exist in", "exists on disk, but not in"];

const ERROR_LIMIT: usize = 500;

/// A bare repository on disk.
#[derive(Debug, Clone)]
pub struct GitRepository {
    program: String,
    git_dir: PathBuf,
    runner: ProcessRunner,
    timeout: Duration,
}

impl GitRepository {
    /// A repository at `git_dir`, queried with `program`.
    pub fn new(
        program: impl Into<String>,
        git_dir: impl Into<PathBuf>,
        runner: ProcessRunner,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            git_dir: git_dir.into(),
            runner,
            timeout,
        }
    }

    /// Location of the bare clone.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn command<I, S>(&self, args: I) -> ToolCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ToolCommand::new(&self.program)
            .arg("--git-dir")
            .arg(self.git_dir.display().to_string())
            .args(args)
            .timeout(self.timeout)
    }

    /// Run a query; `Ok(Err(stderr))` when git exited non-zero.
    async fn query(&self, command: ToolCommand) -> Result<Result<String, String>, RepositoryError> {
        match self.runner.run(&command).await {
            ProcessOutcome::Exited {
                code: Some(0),
                stdout,
                ..
            } => Ok(Ok(stdout)),
            ProcessOutcome::Exited { stderr, .. } => Ok(Err(stderr)),
            ProcessOutcome::TimedOut { limit } => Err(RepositoryError::QueryFailed(format!(
                "'{}' timed out after {}s",
                command.display(),
                limit.as_secs()
            ))),
            ProcessOutcome::Cancelled => {
                Err(RepositoryError::QueryFailed("cancelled".to_string()))
            }
            ProcessOutcome::SpawnFailed(message) => Err(RepositoryError::Unavailable(message)),
        }
    }

    fn failed(command: &str, stderr: &str) -> RepositoryError {
        RepositoryError::QueryFailed(format!("git {command}: {}", clip(stderr.trim(), ERROR_LIMIT)))
    }
}

fn lines(stdout: &str) -> impl Iterator<Item = String> + '_ {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
}

#[async_trait]
impl SourceRepository for GitRepository {
    async fn show(&self, commit: &str, path: &str) -> Result<Option<String>, RepositoryError> {
        let command = self.command(["show".to_string(), format!("{commit}:{path}")]);
        match self.query(command).await? {
            Ok(content) => Ok(Some(content)),
            Err(stderr) if MISSING_PATH_MARKERS.iter().any(|m| stderr.contains(m)) => {
                debug!(commit, path, "path not present at commit");
                Ok(None)
            }
            Err(stderr) => Err(Self::failed("show", &stderr)),
        }
    }

    async fn list_files(&self, commit: &str, prefix: &str) -> Result<Vec<String>, RepositoryError> {
        let mut args = vec![
            "ls-tree".to_string(),
            "-r".to_string(),
            "--name-only".to_string(),
            commit.to_string(),
        ];
        if !prefix.is_empty() {
            args.push("--".to_string());
            args.push(format!("{}/", prefix.trim_end_matches('/')));
        }
        match self.query(self.command(args)).await? {
            Ok(stdout) => {
                let mut files: Vec<String> = lines(&stdout).collect();
                files.sort();
                Ok(files)
            }
            Err(stderr) => Err(Self::failed("ls-tree", &stderr)),
        }
    }

    async fn ancestors(&self, commit: &str, limit: usize) -> Result<Vec<String>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let args = vec![
            "rev-list".to_string(),
            format!("--max-count={}", limit + 1),
            commit.to_string(),
        ];
        match self.query(self.command(args)).await? {
            Ok(stdout) => Ok(lines(&stdout).filter(|c| c != commit).take(limit).collect()),
            Err(stderr) => Err(Self::failed("rev-list", &stderr)),
        }
    }

    async fn descendants(
        &self,
        commit: &str,
        limit: usize,
    ) -> Result<Vec<String>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let args = vec![
            "rev-list".to_string(),
            "--reverse".to_string(),
            "--ancestry-path".to_string(),
            format!("{commit}..HEAD"),
        ];
        match self.query(self.command(args)).await? {
            Ok(stdout) => Ok(lines(&stdout).take(limit).collect()),
            Err(stderr) => Err(Self::failed("rev-list", &stderr)),
        }
    }
}
