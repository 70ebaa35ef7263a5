use crate::identity::EnvIdentity;
use crate::normalize::NormalizedManifest;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const LOCK_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock file parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("lock file serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unsupported lock_version {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("lock file content hash mismatch: lock has '{stored}', recomputed '{computed}'")]
    HashMismatch { stored: String, computed: String },
    #[error("lock file manifest drift: {0}")]
    ManifestDrift(String),
    #[error("lock file resolution drift: {0}")]
    ResolutionDrift(String),
}

/// A package pinned to the version the channel catalog resolved it to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
}

/// Result of resolving the declared packages against a channel catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub channel: String,
    /// In declaration order.
    pub packages: Vec<ResolvedPackage>,
}

/// `sprout.lock`: the resolved package set of an environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockFile {
    pub lock_version: u32,
    pub env_id: String,
    pub short_id: String,
    pub channel: String,
    pub backend: String,
    pub content_hash: String,
    #[serde(default)]
    pub resolved_packages: Vec<ResolvedPackage>,
}

impl LockFile {
    pub fn from_resolved(
        normalized: &NormalizedManifest,
        identity: &EnvIdentity,
        resolution: &ResolutionResult,
    ) -> Self {
        let mut lock = LockFile {
            lock_version: LOCK_VERSION,
            env_id: identity.env_id.to_string(),
            short_id: identity.short_id.to_string(),
            channel: resolution.channel.clone(),
            backend: normalized.runtime_backend.clone(),
            content_hash: String::new(),
            resolved_packages: resolution.packages.clone(),
        };
        lock.content_hash = lock.compute_hash();
        lock
    }

    /// Hash over channel, backend and pinned packages, in order.
    pub fn compute_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(format!("channel:{}", self.channel).as_bytes());
        hasher.update(format!("backend:{}", self.backend).as_bytes());
        for pkg in &self.resolved_packages {
            hasher.update(format!("pkg:{}@{}", pkg.name, pkg.version).as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn verify_integrity(&self) -> Result<(), LockError> {
        if self.lock_version != LOCK_VERSION {
            return Err(LockError::UnsupportedVersion(self.lock_version));
        }
        let computed = self.compute_hash();
        if computed != self.content_hash {
            return Err(LockError::HashMismatch {
                stored: self.content_hash.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Check that the manifest still declares what this lock was written for.
    pub fn verify_manifest_intent(&self, normalized: &NormalizedManifest) -> Result<(), LockError> {
        if self.channel != normalized.channel {
            return Err(LockError::ManifestDrift(format!(
                "channel changed: lock has '{}', manifest has '{}'",
                self.channel, normalized.channel
            )));
        }
        if self.backend != normalized.runtime_backend {
            return Err(LockError::ManifestDrift(format!(
                "backend changed: lock has '{}', manifest has '{}'",
                self.backend, normalized.runtime_backend
            )));
        }
        let locked: Vec<&str> = self
            .resolved_packages
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        let declared: Vec<&str> = normalized.packages.iter().map(String::as_str).collect();
        if locked != declared {
            return Err(LockError::ManifestDrift(format!(
                "packages changed: lock has [{}], manifest has [{}]",
                locked.join(", "),
                declared.join(", ")
            )));
        }
        Ok(())
    }

    /// Check that a fresh resolution pinned the same versions.
    pub fn verify_resolution(&self, resolution: &ResolutionResult) -> Result<(), LockError> {
        for (locked, resolved) in self.resolved_packages.iter().zip(&resolution.packages) {
            if locked != resolved {
                return Err(LockError::ResolutionDrift(format!(
                    "{} resolved to {} but lock pins {}",
                    resolved.name, resolved.version, locked.version
                )));
            }
        }
        if self.resolved_packages.len() != resolution.packages.len() {
            return Err(LockError::ResolutionDrift(format!(
                "lock pins {} packages, resolution produced {}",
                self.resolved_packages.len(),
                resolution.packages.len()
            )));
        }
        Ok(())
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), LockError> {
        let content = toml::to_string_pretty(self)?;
        let dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LockError::Io(e.error))?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> Result<Self, LockError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::compute_env_id;
    use crate::manifest::parse_manifest_str;

    fn sample() -> (NormalizedManifest, LockFile) {
        let normalized = parse_manifest_str(
            r#"
manifest_version = 1
channel = "stable"
packages = ["git", "curl"]
[runtime]
backend = "mock"
"#,
        )
        .unwrap()
        .normalize()
        .unwrap();
        let identity = compute_env_id(&normalized, Path::new("/work")).unwrap();
        let resolution = ResolutionResult {
            channel: "stable".to_owned(),
            packages: vec![
                ResolvedPackage {
                    name: "git".to_owned(),
                    version: "2.45.0".to_owned(),
                },
                ResolvedPackage {
                    name: "curl".to_owned(),
                    version: "8.7.1".to_owned(),
                },
            ],
        };
        let lock = LockFile::from_resolved(&normalized, &identity, &resolution);
        (normalized, lock)
    }

    #[test]
    fn fresh_lock_verifies() {
        let (normalized, lock) = sample();
        lock.verify_integrity().unwrap();
        lock.verify_manifest_intent(&normalized).unwrap();
        assert_eq!(lock.resolved_packages[0].name, "git");
    }

    #[test]
    fn tampered_version_fails_integrity() {
        let (_, mut lock) = sample();
        lock.resolved_packages[0].version = "9.9.9".to_owned();
        assert!(matches!(
            lock.verify_integrity(),
            Err(LockError::HashMismatch { .. })
        ));
    }

    #[test]
    fn package_list_change_is_manifest_drift() {
        let (mut normalized, lock) = sample();
        normalized.packages.push("make".to_owned());
        assert!(matches!(
            lock.verify_manifest_intent(&normalized),
            Err(LockError::ManifestDrift(_))
        ));
    }

    #[test]
    fn channel_change_is_manifest_drift() {
        let (mut normalized, lock) = sample();
        normalized.channel = "unstable".to_owned();
        let err = lock.verify_manifest_intent(&normalized).unwrap_err();
        assert!(err.to_string().contains("unstable"));
    }

    #[test]
    fn version_bump_is_resolution_drift() {
        let (_, lock) = sample();
        let mut resolution = ResolutionResult {
            channel: lock.channel.clone(),
            packages: lock.resolved_packages.clone(),
        };
        lock.verify_resolution(&resolution).unwrap();
        resolution.packages[1].version = "8.8.0".to_owned();
        assert!(matches!(
            lock.verify_resolution(&resolution),
            Err(LockError::ResolutionDrift(_))
        ));
    }

    #[test]
    fn write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sprout.lock");
        let (_, lock) = sample();
        lock.write_to_file(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("lock_version"));
        let back = LockFile::read_from_file(&path).unwrap();
        assert_eq!(back, lock);
    }
}
