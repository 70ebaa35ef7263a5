//! Manifest parsing, normalization, hook commands, and lock files for sprout.
//!
//! This crate defines the schema layer: TOML manifest parsing (`ManifestV1`),
//! the closed set of lifecycle phases (`Phase`), explicit parsing of hook
//! command strings into `Command` values, the preview descriptor registry,
//! normalized representations (`NormalizedManifest`), deterministic environment
//! identity (`compute_env_id`), and lock file generation/verification.

pub mod command;
pub mod identity;
pub mod lock;
pub mod manifest;
pub mod normalize;
pub mod phase;
pub mod preview;
pub mod template;
pub mod types;

pub use command::{Command, CommandParseError};
pub use identity::{compute_env_id, EnvIdentity};
pub use lock::{LockError, LockFile, ResolutionResult, ResolvedPackage};
pub use manifest::{
    parse_manifest_file, parse_manifest_str, CommandDecl, HookDecl, HooksSection, ManifestError,
    ManifestV1, OnStartFailure, PreviewDecl, PreviewsSection, RuntimeSection,
};
pub use normalize::{NormalizedHook, NormalizedManifest};
pub use phase::Phase;
pub use preview::{PreviewDescriptor, PreviewRegistry};
pub use template::{get_template, list_templates, Template, BUILTIN_TEMPLATES};
pub use types::{EnvId, ObjectHash, ShortId};

/// Default manifest file name looked up in a project directory.
pub const MANIFEST_FILE: &str = "sprout.toml";

/// Lock file name written next to the manifest.
pub const LOCK_FILE: &str = "sprout.lock";
