use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Current store format version. Incremented on incompatible layout changes.
pub const STORE_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";

/// Directory layout of a sprout store.
///
/// ```text
/// <root>/
///   channels/<channel>.toml     package catalogs for the host backend
///   env/<env_id>/               provisioned environment root
///   env/<env_id>/profile/bin/   package binaries, prepended to PATH
///   store/objects/              normalized manifests by blake3 hash
///   store/metadata/             one JSON file per environment
///   store/wal/                  in-flight operations
/// ```
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreVersion {
    format_version: u32,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn store_dir(&self) -> PathBuf {
        self.root.join("store")
    }

    #[inline]
    pub fn objects_dir(&self) -> PathBuf {
        self.store_dir().join("objects")
    }

    #[inline]
    pub fn metadata_dir(&self) -> PathBuf {
        self.store_dir().join("metadata")
    }

    #[inline]
    pub fn wal_dir(&self) -> PathBuf {
        self.store_dir().join("wal")
    }

    #[inline]
    pub fn channels_dir(&self) -> PathBuf {
        self.root.join("channels")
    }

    #[inline]
    pub fn channel_catalog(&self, channel: &str) -> PathBuf {
        self.channels_dir().join(format!("{channel}.toml"))
    }

    #[inline]
    pub fn env_dir(&self) -> PathBuf {
        self.root.join("env")
    }

    #[inline]
    pub fn env_path(&self, env_id: &str) -> PathBuf {
        self.env_dir().join(env_id)
    }

    #[inline]
    pub fn profile_dir(&self, env_id: &str) -> PathBuf {
        self.env_path(env_id).join("profile")
    }

    #[inline]
    pub fn profile_bin_dir(&self, env_id: &str) -> PathBuf {
        self.profile_dir(env_id).join("bin")
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.store_dir().join(".lock")
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.objects_dir())?;
        fs::create_dir_all(self.metadata_dir())?;
        fs::create_dir_all(self.wal_dir())?;
        fs::create_dir_all(self.env_dir())?;
        fs::create_dir_all(self.channels_dir())?;

        let version_path = self.store_dir().join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = StoreVersion {
                format_version: STORE_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            let store_dir = self.store_dir();
            let mut tmp = NamedTempFile::new_in(&store_dir)?;
            tmp.write_all(content.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&version_path)
                .map_err(|e| StoreError::Io(e.error))?;
            crate::fsync_dir(&store_dir)?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let version_path = self.store_dir().join(VERSION_FILE);
        let content = fs::read_to_string(&version_path)?;
        let ver: StoreVersion = serde_json::from_str(&content)?;

        if ver.format_version != STORE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: STORE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = StoreLayout::new("/tmp/sprout-test");
        assert_eq!(
            layout.objects_dir(),
            PathBuf::from("/tmp/sprout-test/store/objects")
        );
        assert_eq!(
            layout.metadata_dir(),
            PathBuf::from("/tmp/sprout-test/store/metadata")
        );
        assert_eq!(
            layout.channel_catalog("stable-24.05"),
            PathBuf::from("/tmp/sprout-test/channels/stable-24.05.toml")
        );
        assert_eq!(
            layout.profile_bin_dir("abc123"),
            PathBuf::from("/tmp/sprout-test/env/abc123/profile/bin")
        );
    }

    #[test]
    fn initialize_creates_directories_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();

        assert!(layout.objects_dir().is_dir());
        assert!(layout.metadata_dir().is_dir());
        assert!(layout.wal_dir().is_dir());
        assert!(layout.env_dir().is_dir());
        assert!(layout.channels_dir().is_dir());
        layout.verify_version().unwrap();
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.initialize().unwrap();
        layout.verify_version().unwrap();
    }

    #[test]
    fn foreign_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        fs::write(
            layout.store_dir().join("version"),
            r#"{"format_version": 99}"#,
        )
        .unwrap();
        assert!(matches!(
            layout.initialize(),
            Err(StoreError::VersionMismatch { found: 99, .. })
        ));
    }
}
