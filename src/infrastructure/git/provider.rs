//! Lazily cloned project repositories.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::repository::GitRepository;
use crate::domain::errors::RepositoryError;
use crate::domain::models::Config;
use crate::domain::ports::{RepositoryProvider, SourceRepository};
use crate::infrastructure::process::{clip, ProcessOutcome, ProcessRunner, ToolCommand};

const ERROR_LIMIT: usize = 1000;

type Slot = Arc<Mutex<Option<Result<Arc<GitRepository>, RepositoryError>>>>;

/// Hands out one bare clone per project.
///
/// The first request for a project clones it while holding that project's
/// lock; concurrent requests wait and share the result. Failures are
/// remembered so later units of the same project fail fast.
pub struct GitRepositoryProvider {
    program: String,
    repos_dir: PathBuf,
    url_template: String,
    clone_timeout: Duration,
    query_timeout: Duration,
    runner: ProcessRunner,
    slots: Mutex<HashMap<String, Slot>>,
}

impl GitRepositoryProvider {
    /// A provider cloning into `config.repos_dir` through `runner`.
    pub fn new(config: &Config, runner: ProcessRunner) -> Self {
        Self {
            program: config.git.program.clone(),
            repos_dir: config.repos_dir.clone(),
            url_template: config.repository_url_template.clone(),
            clone_timeout: Duration::from_secs(config.git.clone_timeout_secs),
            query_timeout: Duration::from_secs(config.git.query_timeout_secs),
            runner,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, project: &str) -> Slot {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(project.to_string()).or_default())
    }

    async fn prepare(&self, project: &str) -> Result<Arc<GitRepository>, RepositoryError> {
        if project.is_empty()
            || project.contains(['/', '\\'])
            || project.starts_with('.')
        {
            return Err(RepositoryError::Unavailable(format!(
                "invalid project name '{project}'"
            )));
        }

        let git_dir = self.repos_dir.join(format!("{project}.git"));
        let repo = Arc::new(GitRepository::new(
            &self.program,
            &git_dir,
            self.runner.clone(),
            self.query_timeout,
        ));
        if git_dir.join("HEAD").is_file() {
            return Ok(repo);
        }

        tokio::fs::create_dir_all(&self.repos_dir).await.map_err(|e| {
            RepositoryError::Unavailable(format!(
                "cannot create {}: {e}",
                self.repos_dir.display()
            ))
        })?;
        // Leftovers of an interrupted clone.
        if git_dir.exists() {
            let _ = tokio::fs::remove_dir_all(&git_dir).await;
        }

        let url = self.url_template.replace("{project}", project);
        info!(project, url = %url, "Cloning repository");
        let command = ToolCommand::new(&self.program)
            .args(["clone", "--bare", "--quiet"])
            .arg(url.clone())
            .arg(git_dir.display().to_string())
            .timeout(self.clone_timeout);

        let failure = match self.runner.run(&command).await {
            ProcessOutcome::Exited { code: Some(0), .. } => return Ok(repo),
            ProcessOutcome::Exited { stderr, .. } => {
                format!("clone of {url} failed: {}", clip(stderr.trim(), ERROR_LIMIT))
            }
            ProcessOutcome::TimedOut { limit } => {
                format!("clone of {url} timed out after {}s", limit.as_secs())
            }
            ProcessOutcome::Cancelled => format!("clone of {url} cancelled"),
            ProcessOutcome::SpawnFailed(message) => message,
        };
        let _ = tokio::fs::remove_dir_all(&git_dir).await;
        warn!(project, error = %failure, "Repository unavailable");
        Err(RepositoryError::Unavailable(failure))
    }
}

#[async_trait]
impl RepositoryProvider for GitRepositoryProvider {
    async fn open(&self, project: &str) -> Result<Arc<dyn SourceRepository>, RepositoryError> {
        let slot = self.slot(project).await;
        let mut guard = slot.lock().await;
        if guard.is_none() {
            *guard = Some(self.prepare(project).await);
        }
        match guard.as_ref() {
            Some(Ok(repo)) => Ok(Arc::clone(repo) as Arc<dyn SourceRepository>),
            Some(Err(e)) => Err(e.clone()),
            None => Err(RepositoryError::Unavailable(format!(
                "repository for '{project}' not prepared"
            ))),
        }
    }
}
