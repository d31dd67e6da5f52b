//! Unit-scoped working directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::UnitId;

/// A private scratch directory for one unit.
///
/// Lives under `<output>/work/`, is named after the unit digest, and is
/// removed when dropped on every exit path of the owning worker.
#[derive(Debug)]
pub struct UnitWorkspace {
    dir: TempDir,
}

impl UnitWorkspace {
    /// Allocate a fresh directory for `unit` under `parent`.
    pub fn allocate(parent: &Path, unit: &UnitId) -> PipelineResult<Self> {
        let allocation_error = |source| PipelineError::WorkspaceAllocation {
            path: parent.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(parent).map_err(allocation_error)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", unit.short_digest()))
            .tempdir_in(parent)
            .map_err(allocation_error)?;
        Ok(Self { dir })
    }

    /// Root of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A subdirectory, created on demand.
    pub fn subdir(&self, name: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }
}
