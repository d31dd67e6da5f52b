//! Port trait definitions (Hexagonal Architecture)
//!
//! - `SourceRepository`: read-only access to one project's history
//! - `RepositoryProvider`: hands out repositories per project
//!
//! The git-backed adapters live in `infrastructure::git`; the in-memory ones
//! back tests and dry runs.

pub mod in_memory;
pub mod repository;

pub use in_memory::{InMemoryProvider, InMemoryRepository};
pub use repository::{RepositoryProvider, SourceRepository};
