use crate::layout::StoreLayout;
use crate::report::PhaseReport;
use crate::{fsync_dir, StoreError};
use serde::{Deserialize, Serialize};
use sprout_schema::types::{EnvId, ObjectHash, ShortId};
use sprout_schema::Phase;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Lifecycle state of a provisioned environment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnvState {
    /// Packages installed; `onCreate` pending or in progress.
    Resolved,
    /// `onCreate` completed successfully.
    Created,
    /// `onCreate` failed or was interrupted. Destroy and provision again.
    Failed,
    /// At least one start completed successfully.
    Started,
}

impl std::fmt::Display for EnvState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvState::Resolved => write!(f, "resolved"),
            EnvState::Created => write!(f, "created"),
            EnvState::Failed => write!(f, "failed"),
            EnvState::Started => write!(f, "started"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvMetadata {
    pub env_id: EnvId,
    pub short_id: ShortId,
    #[serde(default)]
    pub name: Option<String>,
    pub state: EnvState,
    /// Object hash of the normalized manifest this environment was provisioned from.
    pub manifest_hash: ObjectHash,
    pub project_dir: PathBuf,
    pub channel: String,
    pub backend: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub create_runs: u32,
    #[serde(default)]
    pub start_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_create: Option<PhaseReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_start: Option<PhaseReport>,
    /// blake3 checksum for integrity verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl EnvMetadata {
    /// Compute the checksum over the metadata content (excluding the checksum field itself).
    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn last_report(&self, phase: Phase) -> Option<&PhaseReport> {
        match phase {
            Phase::OnCreate => self.last_create.as_ref(),
            Phase::OnStart => self.last_start.as_ref(),
        }
    }

    pub fn record_report(&mut self, report: PhaseReport) {
        match report.phase {
            Phase::OnCreate => self.last_create = Some(report),
            Phase::OnStart => self.last_start = Some(report),
        }
    }
}

pub fn validate_env_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.len() > 64 {
        return Err(StoreError::InvalidName(
            "environment name must be 1-64 characters".to_owned(),
        ));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(StoreError::InvalidName(
            "environment name must match [a-zA-Z0-9_-]".to_owned(),
        ));
    }
    Ok(())
}

pub struct MetadataStore {
    layout: StoreLayout,
}

impl MetadataStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn put(&self, meta: &EnvMetadata) -> Result<(), StoreError> {
        let dest = self.layout.metadata_dir().join(&meta.env_id);

        let mut meta_with_checksum = meta.clone();
        meta_with_checksum.checksum = Some(meta_with_checksum.compute_checksum()?);
        let content = serde_json::to_string_pretty(&meta_with_checksum)?;

        let dir = self.layout.metadata_dir();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        Ok(())
    }

    pub fn get(&self, env_id: &str) -> Result<EnvMetadata, StoreError> {
        let path = self.layout.metadata_dir().join(env_id);
        if !path.exists() {
            return Err(StoreError::EnvNotFound(env_id.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        let meta: EnvMetadata = serde_json::from_str(&content)?;

        if let Some(ref expected) = meta.checksum {
            let actual = meta.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    hash: env_id.to_owned(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(meta)
    }

    /// Read, modify and write back one environment's metadata, bumping `updated_at`.
    pub fn update<F>(&self, env_id: &str, f: F) -> Result<EnvMetadata, StoreError>
    where
        F: FnOnce(&mut EnvMetadata),
    {
        let mut meta = self.get(env_id)?;
        f(&mut meta);
        meta.updated_at = chrono::Utc::now().to_rfc3339();
        self.put(&meta)?;
        Ok(meta)
    }

    pub fn update_state(&self, env_id: &str, new_state: EnvState) -> Result<(), StoreError> {
        self.update(env_id, |meta| meta.state = new_state)?;
        Ok(())
    }

    pub fn exists(&self, env_id: &str) -> bool {
        self.layout.metadata_dir().join(env_id).exists()
    }

    pub fn remove(&self, env_id: &str) -> Result<(), StoreError> {
        let path = self.layout.metadata_dir().join(env_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<EnvMetadata>, StoreError> {
        let dir = self.layout.metadata_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name();
                let name_str = name.to_str().unwrap_or("");
                if !name_str.starts_with('.') {
                    match self.get(name_str) {
                        Ok(meta) => results.push(meta),
                        Err(e) => {
                            tracing::warn!("skipping corrupted metadata entry '{name_str}': {e}");
                        }
                    }
                }
            }
        }
        results.sort_by(|a, b| a.env_id.cmp(&b.env_id));
        Ok(results)
    }

    pub fn get_by_name(&self, name: &str) -> Result<EnvMetadata, StoreError> {
        let all = self.list()?;
        all.into_iter()
            .find(|m| m.name.as_deref() == Some(name))
            .ok_or_else(|| StoreError::EnvNotFound(format!("name '{name}'")))
    }

    pub fn update_name(&self, env_id: &str, name: Option<String>) -> Result<(), StoreError> {
        if let Some(ref n) = name {
            validate_env_name(n)?;
            if let Ok(existing) = self.get_by_name(n) {
                if *existing.env_id != *env_id {
                    return Err(StoreError::NameConflict {
                        name: n.clone(),
                        existing_env_id: existing.short_id.to_string(),
                    });
                }
            }
        }
        self.update(env_id, |meta| meta.name = name)?;
        Ok(())
    }
}
