use crate::RuntimeError;
use sprout_store::StoreLayout;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub const ENV_ID_VAR: &str = "SPROUT_ENV_ID";
pub const ENV_ROOT_VAR: &str = "SPROUT_ENV_ROOT";

/// A provisioned environment as seen by installers, hooks and previews.
///
/// Created by provisioning, passed to the resolver for installation and to
/// every hook and preview launch, and torn down by destroy. Holds no open
/// resources; dropping it does not remove anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentHandle {
    pub env_id: String,
    /// `<store>/env/<env_id>`
    pub root: PathBuf,
    /// Package binaries; prepended to PATH.
    pub profile_bin: PathBuf,
    /// Project directory hooks run in.
    pub workdir: PathBuf,
    /// Variables every child process of this environment receives.
    pub base_env: BTreeMap<String, String>,
}

impl EnvironmentHandle {
    pub fn new(layout: &StoreLayout, env_id: &str, workdir: impl Into<PathBuf>) -> Self {
        let root = layout.env_path(env_id);
        let profile_bin = layout.profile_bin_dir(env_id);
        let mut base_env = BTreeMap::new();
        base_env.insert(ENV_ID_VAR.to_owned(), env_id.to_owned());
        base_env.insert(ENV_ROOT_VAR.to_owned(), root.to_string_lossy().into_owned());
        Self {
            env_id: env_id.to_owned(),
            root,
            profile_bin,
            workdir: workdir.into(),
            base_env,
        }
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.root.join("profile")
    }

    /// Create the environment root and profile directories.
    pub fn prepare(&self) -> Result<(), RuntimeError> {
        fs::create_dir_all(&self.profile_bin)?;
        debug!("prepared environment root {}", self.root.display());
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Remove the environment root. Missing roots are not an error.
    pub fn teardown(&self) -> Result<(), RuntimeError> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
            debug!("removed environment root {}", self.root.display());
        }
        Ok(())
    }

    /// PATH with the profile bin directory in front of `inherited`.
    pub fn search_path(&self, inherited: Option<OsString>) -> Result<OsString, RuntimeError> {
        let mut dirs = vec![self.profile_bin.clone()];
        if let Some(path) = inherited {
            dirs.extend(std::env::split_paths(&path));
        }
        std::env::join_paths(dirs).map_err(|e| {
            RuntimeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })
    }
}
