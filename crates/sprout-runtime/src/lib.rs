//! Package resolution and process execution for sprout environments.
//!
//! This crate implements the execution layer: the pluggable `ResolverBackend`
//! trait with a catalog-driven `host` backend and a built-in `mock` backend,
//! the `EnvironmentHandle` that hooks and previews run against, and child
//! process construction with the environment's PATH and variables.

pub mod backend;
pub mod catalog;
pub mod handle;
pub mod host;
pub mod mock;
pub mod process;

pub use backend::{select_backend, ResolverBackend};
pub use catalog::{CatalogEntry, ChannelCatalog};
pub use handle::EnvironmentHandle;
pub use process::{ExitOutcome, ProcessRunner};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available (expected 'host' or 'mock')")]
    BackendUnavailable(String),
    #[error("unknown channel '{channel}': no catalog at {path}")]
    UnknownChannel { channel: String, path: String },
    #[error("invalid catalog for channel '{channel}': {message}")]
    InvalidCatalog { channel: String, message: String },
    #[error("channel '{channel}' does not provide: {}", packages.join(", "))]
    UnknownPackages {
        channel: String,
        packages: Vec<String>,
    },
    #[error("failed to install package '{package}': {message}")]
    InstallFailed { package: String, message: String },
    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        source: std::io::Error,
    },
}
