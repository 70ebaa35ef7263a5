use crate::layout::StoreLayout;
use crate::metadata::{EnvState, MetadataStore};
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// A single rollback step that can undo part of an operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RollbackStep {
    /// Remove a directory tree (e.g. a half-provisioned env dir).
    RemoveDir(PathBuf),
    /// Remove a single file (e.g. metadata written before `onCreate` finished).
    RemoveFile(PathBuf),
    /// Force an environment's state (e.g. Resolved -> Failed after a crash mid-`onCreate`).
    /// With `only_from` set, the reset applies only while the state still equals it.
    ResetState {
        env_id: String,
        target_state: EnvState,
        #[serde(default)]
        only_from: Option<EnvState>,
    },
}

/// The type of mutating operation being tracked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WalOpKind {
    Provision,
    Create,
    Start,
    Destroy,
}

impl std::fmt::Display for WalOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalOpKind::Provision => write!(f, "provision"),
            WalOpKind::Create => write!(f, "create"),
            WalOpKind::Start => write!(f, "start"),
            WalOpKind::Destroy => write!(f, "destroy"),
        }
    }
}

/// A WAL entry representing an in-flight operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub op_id: String,
    pub kind: WalOpKind,
    pub env_id: String,
    pub timestamp: String,
    pub rollback_steps: Vec<RollbackStep>,
}

/// Write-ahead log for crash recovery.
///
/// Mutating engine methods create a WAL entry before starting work,
/// append rollback steps as side effects occur, and remove the entry
/// on successful completion. On startup, incomplete entries are rolled back
/// in reverse step order.
pub struct WriteAheadLog {
    layout: StoreLayout,
    wal_dir: PathBuf,
}

impl WriteAheadLog {
    pub fn new(layout: &StoreLayout) -> Self {
        Self {
            layout: layout.clone(),
            wal_dir: layout.wal_dir(),
        }
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.wal_dir)?;
        Ok(())
    }

    /// Begin a new WAL entry for an operation. Returns the op_id.
    pub fn begin(&self, kind: WalOpKind, env_id: &str) -> Result<String, StoreError> {
        let op_id = format!(
            "{}-{}-{kind}",
            chrono::Utc::now().format("%Y%m%d%H%M%S%6f"),
            &blake3::hash(env_id.as_bytes()).to_hex()[..8]
        );
        let entry = WalEntry {
            op_id: op_id.clone(),
            kind,
            env_id: env_id.to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            rollback_steps: Vec::new(),
        };
        self.write_entry(&entry)?;
        debug!("WAL begin: {kind} for {env_id} (op_id={op_id})");
        Ok(op_id)
    }

    pub fn add_rollback_step(&self, op_id: &str, step: RollbackStep) -> Result<(), StoreError> {
        let mut entry = self.read_entry(op_id)?;
        entry.rollback_steps.push(step);
        self.write_entry(&entry)
    }

    /// Commit (remove) a WAL entry after successful completion.
    pub fn commit(&self, op_id: &str) -> Result<(), StoreError> {
        let path = self.entry_path(op_id);
        if path.exists() {
            fs::remove_file(&path)?;
            debug!("WAL commit: {op_id}");
        }
        Ok(())
    }

    pub fn list_incomplete(&self) -> Result<Vec<WalEntry>, StoreError> {
        if !self.wal_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.wal_dir)? {
            let path = dir_entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                match fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str::<WalEntry>(&content) {
                        Ok(entry) => entries.push(entry),
                        Err(e) => {
                            warn!("corrupt WAL entry {}: {e}", path.display());
                            let _ = fs::remove_file(&path);
                        }
                    },
                    Err(e) => {
                        warn!("unreadable WAL entry {}: {e}", path.display());
                        let _ = fs::remove_file(&path);
                    }
                }
            }
        }
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    /// Roll back all incomplete WAL entries. Returns the number rolled back.
    pub fn recover(&self) -> Result<usize, StoreError> {
        let entries = self.list_incomplete()?;
        let count = entries.len();
        for entry in &entries {
            info!(
                "WAL recovery: rolling back {} on {} (op_id={})",
                entry.kind, entry.env_id, entry.op_id
            );
            self.rollback_entry(entry);
            let _ = fs::remove_file(self.entry_path(&entry.op_id));
        }
        if count > 0 {
            info!("WAL recovery complete: {count} entries rolled back");
        }
        Ok(count)
    }

    fn rollback_entry(&self, entry: &WalEntry) {
        for step in entry.rollback_steps.iter().rev() {
            match step {
                RollbackStep::RemoveDir(path) => {
                    if path.exists() {
                        if let Err(e) = fs::remove_dir_all(path) {
                            warn!("WAL rollback: failed to remove dir {}: {e}", path.display());
                        } else {
                            debug!("WAL rollback: removed dir {}", path.display());
                        }
                    }
                }
                RollbackStep::RemoveFile(path) => {
                    if path.exists() {
                        if let Err(e) = fs::remove_file(path) {
                            warn!(
                                "WAL rollback: failed to remove file {}: {e}",
                                path.display()
                            );
                        } else {
                            debug!("WAL rollback: removed file {}", path.display());
                        }
                    }
                }
                RollbackStep::ResetState {
                    env_id,
                    target_state,
                    only_from,
                } => {
                    let meta_store = MetadataStore::new(self.layout.clone());
                    let current = match meta_store.get(env_id) {
                        Ok(meta) => meta.state,
                        Err(_) => continue,
                    };
                    if matches!(only_from, Some(expected) if *expected != current) {
                        debug!("WAL rollback: {env_id} already reached {current}, keeping it");
                        continue;
                    }
                    match meta_store.update_state(env_id, *target_state) {
                        Ok(()) => debug!("WAL rollback: reset {env_id} state to {target_state}"),
                        Err(e) => warn!("WAL rollback: failed to reset state of {env_id}: {e}"),
                    }
                }
            }
        }
    }

    fn entry_path(&self, op_id: &str) -> PathBuf {
        self.wal_dir.join(format!("{op_id}.json"))
    }

    fn write_entry(&self, entry: &WalEntry) -> Result<(), StoreError> {
        fs::create_dir_all(&self.wal_dir)?;
        let content = serde_json::to_string_pretty(entry)?;
        let mut tmp = NamedTempFile::new_in(&self.wal_dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        let dest = self.entry_path(&entry.op_id);
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        crate::fsync_dir(&self.wal_dir)?;
        Ok(())
    }

    fn read_entry(&self, op_id: &str) -> Result<WalEntry, StoreError> {
        let content = fs::read_to_string(self.entry_path(op_id))?;
        Ok(serde_json::from_str(&content)?)
    }
}
