//! Core orchestration engine for sprout environments.
//!
//! This crate ties together manifest parsing, store operations, and resolver
//! backends into the `Engine`: the central API for provisioning, starting,
//! destroying, and inspecting environments. It also provides the lifecycle hook
//! executor, concurrent store locking, and state-machine transition validation.

pub mod concurrency;
pub mod engine;
pub mod executor;
pub mod lifecycle;

pub use concurrency::{install_signal_handler, shutdown_requested, StoreLock};
pub use engine::{Engine, ProvisionOptions, ProvisionResult, StartResult, UpResult};
pub use executor::{FailurePolicy, HookExecutor};
pub use lifecycle::validate_transition;

use sprout_schema::Phase;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] sprout_schema::ManifestError),
    #[error("lock error: {0}")]
    Lock(#[from] sprout_schema::LockError),
    #[error("store error: {0}")]
    Store(#[from] sprout_store::StoreError),
    /// Unknown channel or package, or a failed install. Nothing was left behind.
    #[error("resolution error: {0}")]
    Resolution(sprout_runtime::RuntimeError),
    #[error("runtime error: {0}")]
    Runtime(#[from] sprout_runtime::RuntimeError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("environment not found: {0}")]
    EnvNotFound(String),
    #[error("environment {env_id} is already provisioned (state: {state})")]
    AlreadyProvisioned { env_id: String, state: String },
    #[error("hook failed: {phase} hook '{hook}' {status}")]
    HookFailed {
        phase: Phase,
        hook: String,
        status: String,
    },
    #[error("interrupted: shutdown requested during {0}")]
    Interrupted(Phase),
    #[error("previews are disabled for environment {0}")]
    PreviewsDisabled(String),
    #[error("no preview '{id}' in environment {env_id}")]
    PreviewNotFound { env_id: String, id: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
