use crate::command::CommandParseError;
use crate::phase::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("manifest serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unsupported manifest_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("channel must not be empty")]
    EmptyChannel,
    #[error("{phase} hook #{index} has an empty name")]
    EmptyHookName { phase: Phase, index: usize },
    #[error("{phase} hook '{hook}' is declared more than once")]
    DuplicateHook { phase: Phase, hook: String },
    #[error("{phase} hook '{hook}' has an invalid command: {source}")]
    InvalidHookCommand {
        phase: Phase,
        hook: String,
        source: CommandParseError,
    },
    #[error("preview id must not be empty")]
    EmptyPreviewId,
    #[error("preview '{0}' is declared more than once")]
    DuplicatePreview(String),
    #[error("preview '{id}' has an invalid command: {source}")]
    InvalidPreviewCommand {
        id: String,
        source: CommandParseError,
    },
    #[error("invalid environment variable name '{name}' in {context}")]
    InvalidEnvName { name: String, context: String },
}

/// The on-disk environment declaration (`sprout.toml`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ManifestV1 {
    pub manifest_version: u32,
    pub channel: String,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub hooks: HooksSection,
    #[serde(default)]
    pub previews: PreviewsSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub on_start_failure: OnStartFailure,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            on_start_failure: OnStartFailure::default(),
        }
    }
}

fn default_backend() -> String {
    "host".to_owned()
}

/// What the executor does with the remaining `onStart` hooks after one fails.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OnStartFailure {
    #[default]
    Abort,
    Continue,
}

/// Hook lists keyed by phase. Unknown phase keys are rejected by serde.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HooksSection {
    #[serde(default, rename = "onCreate", skip_serializing_if = "Vec::is_empty")]
    pub on_create: Vec<HookDecl>,
    #[serde(default, rename = "onStart", skip_serializing_if = "Vec::is_empty")]
    pub on_start: Vec<HookDecl>,
}

impl HooksSection {
    pub fn get(&self, phase: Phase) -> &[HookDecl] {
        match phase {
            Phase::OnCreate => &self.on_create,
            Phase::OnStart => &self.on_start,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HookDecl {
    pub name: String,
    pub command: CommandDecl,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// A command given either as one string or as an explicit argument list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandDecl {
    Line(String),
    Argv(Vec<String>),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PreviewsSection {
    #[serde(default)]
    pub enable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<PreviewDecl>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PreviewDecl {
    pub id: String,
    #[serde(default = "default_manager")]
    pub manager: String,
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

fn default_manager() -> String {
    "web".to_owned()
}

pub fn parse_manifest_str(input: &str) -> Result<ManifestV1, ManifestError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ManifestV1, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}
