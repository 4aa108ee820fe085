//! Core engine for zilch: the `Project` aggregate, build-description
//! synthesis, sync orchestration, and environment diffing.
//!
//! A `Project` keeps two mirrored representations of the manifest (the
//! formatting-preserving document and the native source/package
//! collections) in permanent agreement, and everything externally
//! observable goes through a `BuildBackend`.

pub mod concurrency;
pub mod env;
pub mod flake;
pub mod packages;
pub mod project;
pub mod registry;
pub mod sync;

pub use concurrency::{install_signal_handler, shutdown_requested};
pub use env::{diff_environments, env_delta};
pub use flake::{render, Pin, ENV_OUTPUT, FLAKE_FILE_NAME};
pub use packages::PackageSet;
pub use project::{PackageStatus, Project};
pub use registry::SourceRegistry;
pub use sync::Synchronizer;

use thiserror::Error;
use zilch_runtime::RuntimeError;
use zilch_schema::{LockArtifactError, ManifestError};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("lock artifact error: {0}")]
    LockArtifact(#[from] LockArtifactError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("a source with alias '{0}' already exists")]
    DuplicateAlias(String),
    #[error("no source with alias '{0}' is registered")]
    UnknownSource(String),
    #[error("package '{name}' from source '{source_alias}' is already installed")]
    DuplicateInstall { name: String, source_alias: String },
    #[error("package '{0}' is not installed")]
    PackageNotFound(String),
    #[error("failed to lock revisions: {0}")]
    Lock(#[source] RuntimeError),
    #[error("build failed: {0}")]
    Build(#[source] RuntimeError),
    #[error("manifest and in-memory state disagree: {0}")]
    MirrorMismatch(String),
    #[error("interrupted")]
    Interrupted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
