//! In-memory repository implementations.
//!
//! Used by tests and whenever the cascade runs against fixed content
//! instead of real clones.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use super::{RepositoryProvider, SourceRepository};
use crate::domain::errors::RepositoryError;

/// A repository backed by maps.
///
/// History is linear: `history[0]` is the oldest commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    files: BTreeMap<(String, String), String>,
    history: Vec<String>,
}

impl InMemoryRepository {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file at `commit`.
    #[must_use]
    pub fn with_file(
        mut self,
        commit: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.files
            .insert((commit.into(), path.into()), content.into());
        self
    }

    /// Set the linear commit history, oldest first.
    #[must_use]
    pub fn with_history<I, S>(mut self, commits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.history = commits.into_iter().map(Into::into).collect();
        self
    }

    fn position(&self, commit: &str) -> Option<usize> {
        self.history.iter().position(|c| c == commit)
    }
}

#[async_trait]
impl SourceRepository for InMemoryRepository {
    async fn show(&self, commit: &str, path: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .files
            .get(&(commit.to_string(), path.to_string()))
            .cloned())
    }

    async fn list_files(&self, commit: &str, prefix: &str) -> Result<Vec<String>, RepositoryError> {
        let dir = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };
        Ok(self
            .files
            .keys()
            .filter(|(c, p)| c == commit && p.starts_with(&dir))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn ancestors(&self, commit: &str, limit: usize) -> Result<Vec<String>, RepositoryError> {
        let Some(pos) = self.position(commit) else {
            return Ok(Vec::new());
        };
        Ok(self.history[..pos].iter().rev().take(limit).cloned().collect())
    }

    async fn descendants(
        &self,
        commit: &str,
        limit: usize,
    ) -> Result<Vec<String>, RepositoryError> {
        let Some(pos) = self.position(commit) else {
            return Ok(Vec::new());
        };
        Ok(self.history[pos + 1..].iter().take(limit).cloned().collect())
    }
}

/// A provider handing out fixed repositories; unknown projects are unavailable.
#[derive(Default, Clone)]
pub struct InMemoryProvider {
    repos: HashMap<String, Arc<InMemoryRepository>>,
}

impl InMemoryProvider {
    /// A provider knowing no projects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `repo` under `project`.
    #[must_use]
    pub fn with_repository(mut self, project: impl Into<String>, repo: InMemoryRepository) -> Self {
        self.repos.insert(project.into(), Arc::new(repo));
        self
    }
}

#[async_trait]
impl RepositoryProvider for InMemoryProvider {
    async fn open(&self, project: &str) -> Result<Arc<dyn SourceRepository>, RepositoryError> {
        self.repos
            .get(project)
            .map(|repo| Arc::clone(repo) as Arc<dyn SourceRepository>)
            .ok_or_else(|| RepositoryError::Unavailable(format!("no repository for '{project}'")))
    }
}
