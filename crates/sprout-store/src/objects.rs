use crate::layout::StoreLayout;
use crate::{fsync_dir, StoreError};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Content-addressable object store backed by blake3 hashing.
///
/// Holds the normalized manifest of every provisioned environment, so later
/// starts execute exactly what was provisioned. Reads verify the hash.
pub struct ObjectStore {
    layout: StoreLayout,
}

impl ObjectStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Store data and return its blake3 hash. Existing objects are not rewritten.
    pub fn put(&self, data: &[u8]) -> Result<String, StoreError> {
        let hash = blake3::hash(data).to_hex().to_string();
        let dest = self.layout.objects_dir().join(&hash);

        if dest.exists() {
            return Ok(hash);
        }

        let dir = self.layout.objects_dir();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        Ok(hash)
    }

    pub fn get(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.layout.objects_dir().join(hash);
        if !path.exists() {
            return Err(StoreError::ObjectNotFound(hash.to_owned()));
        }
        let data = fs::read(&path)?;

        let actual = blake3::hash(&data).to_hex();
        if actual.as_str() != hash {
            return Err(StoreError::IntegrityFailure {
                hash: hash.to_owned(),
                expected: hash.to_owned(),
                actual: actual.to_string(),
            });
        }

        Ok(data)
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.layout.objects_dir().join(hash).exists()
    }

    pub fn remove(&self, hash: &str) -> Result<(), StoreError> {
        let path = self.layout.objects_dir().join(hash);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
