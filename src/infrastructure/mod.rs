//! Infrastructure layer module
//!
//! This module contains all adapters to the outside world:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Process management (bounded tool execution, cancellation)
//! - Git repositories (bare clones per project)
//! - Corpus reading and unit-scoped working directories
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod corpus;
pub mod git;
pub mod logging;
pub mod process;
pub mod workspace;
