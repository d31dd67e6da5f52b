//! Git-backed repository adapters
//!
//! One bare clone per project, created lazily and queried through the
//! [`ProcessRunner`](crate::infrastructure::process::ProcessRunner).

pub mod provider;
pub mod repository;

pub use provider::GitRepositoryProvider;
pub use repository::GitRepository;
