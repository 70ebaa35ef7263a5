//! On-disk state for sprout environments.
//!
//! This crate provides the storage layer: `StoreLayout` for directory structure
//! management, a content-addressable `ObjectStore` holding normalized manifests,
//! `MetadataStore` for per-environment lifecycle state and phase reports, and a
//! `WriteAheadLog` that rolls back interrupted provisioning on the next run.

pub mod layout;
pub mod metadata;
pub mod objects;
pub mod report;
pub mod wal;

pub use layout::{StoreLayout, STORE_FORMAT_VERSION};
pub use metadata::{validate_env_name, EnvMetadata, EnvState, MetadataStore};
pub use objects::ObjectStore;
pub use report::{HookOutcome, HookStatus, PhaseReport};
pub use wal::{RollbackStep, WalEntry, WalOpKind, WriteAheadLog};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory so a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("integrity check failed for '{hash}': expected {expected}, got {actual}")]
    IntegrityFailure {
        hash: String,
        expected: String,
        actual: String,
    },
    #[error("object not found: {0}")]
    ObjectNotFound(String),
    #[error("environment not found: {0}")]
    EnvNotFound(String),
    #[error("store format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid environment name: {0}")]
    InvalidName(String),
    #[error("name '{name}' is already used by environment {existing_env_id}")]
    NameConflict {
        name: String,
        existing_env_id: String,
    },
}
