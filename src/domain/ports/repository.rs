//! Source repository ports.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::RepositoryError;

/// Read-only view of one project's version history.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Content of `path` at `commit`, or `None` when the file does not exist there.
    async fn show(&self, commit: &str, path: &str) -> Result<Option<String>, RepositoryError>;

    /// Paths of all files at `commit` under the directory `prefix`, sorted.
    async fn list_files(&self, commit: &str, prefix: &str) -> Result<Vec<String>, RepositoryError>;

    /// Up to `limit` ancestors of `commit`, nearest first, excluding `commit`.
    async fn ancestors(&self, commit: &str, limit: usize) -> Result<Vec<String>, RepositoryError>;

    /// Up to `limit` descendants of `commit`, nearest first, excluding `commit`.
    async fn descendants(&self, commit: &str, limit: usize)
    -> Result<Vec<String>, RepositoryError>;
}

/// Opens (and caches) repositories by project name.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// The repository of `project`.
    ///
    /// Fails with [`RepositoryError::Unavailable`] when the project cannot be
    /// obtained; implementations remember that failure for later calls.
    async fn open(&self, project: &str) -> Result<Arc<dyn SourceRepository>, RepositoryError>;
}
