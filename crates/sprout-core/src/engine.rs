use crate::concurrency::StoreLock;
use crate::executor::{phase_error, FailurePolicy, HookExecutor};
use crate::lifecycle::{can_start, validate_transition};
use crate::CoreError;
use sprout_runtime::{select_backend, EnvironmentHandle, ProcessRunner};
use sprout_schema::{
    compute_env_id, parse_manifest_file, EnvIdentity, LockFile, ManifestV1, NormalizedManifest,
    ObjectHash, Phase, PreviewRegistry, LOCK_FILE,
};
use sprout_store::{
    validate_env_name, EnvMetadata, EnvState, MetadataStore, ObjectStore, PhaseReport,
    RollbackStep, StoreLayout, WalOpKind, WriteAheadLog,
};
use std::path::{Path, PathBuf};
use std::process::Child;
use tracing::{debug, info, warn};

pub const PREVIEW_VAR: &str = "SPROUT_PREVIEW";

/// Central orchestration engine for the sprout environment lifecycle.
///
/// Coordinates manifest parsing, object storage, resolver backends, and the
/// hook executor to provide provision, start, destroy, and inspection
/// operations. Mutating callers should hold a [`StoreLock`].
pub struct Engine {
    layout: StoreLayout,
    meta_store: MetadataStore,
    obj_store: ObjectStore,
    wal: WriteAheadLog,
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    /// Require an existing lock file and fail if resolution would drift from it.
    pub locked: bool,
    pub name: Option<String>,
}

/// Result of a successful provision.
#[derive(Debug)]
pub struct ProvisionResult {
    pub identity: EnvIdentity,
    pub lock_file: LockFile,
    pub create_report: PhaseReport,
    pub handle: EnvironmentHandle,
}

#[derive(Debug)]
pub struct StartResult {
    pub env_id: String,
    pub report: PhaseReport,
    pub start_count: u32,
}

#[derive(Debug)]
pub struct UpResult {
    pub identity: EnvIdentity,
    /// `Some` when this call provisioned the environment.
    pub provisioned: Option<ProvisionResult>,
    pub start: StartResult,
}

impl Engine {
    /// Create a new engine rooted at the given store directory.
    ///
    /// On construction, the WAL is scanned for incomplete entries from
    /// previous runs and any orphaned state is rolled back automatically.
    pub fn new(store_root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = store_root.into();
        let layout = StoreLayout::new(&root);
        let meta_store = MetadataStore::new(layout.clone());
        let obj_store = ObjectStore::new(layout.clone());
        let wal = WriteAheadLog::new(&layout);

        // Recovery mutates the store; skip it while another process holds the lock.
        if layout.wal_dir().exists() {
            match StoreLock::try_acquire(&layout.lock_file()) {
                Ok(Some(_lock)) => {
                    if let Err(e) = wal.recover() {
                        warn!("WAL recovery failed: {e}");
                    }
                }
                Ok(None) => debug!("store lock held; skipping WAL recovery"),
                Err(e) => warn!("store lock check failed; skipping WAL recovery: {e}"),
            }
        }

        Self {
            layout,
            meta_store,
            obj_store,
            wal,
        }
    }

    pub fn store_layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Parse and normalize a manifest and compute the identity it provisions to.
    /// Has no side effects.
    pub fn resolve_manifest(
        &self,
        manifest_path: &Path,
    ) -> Result<(ManifestV1, NormalizedManifest, EnvIdentity, PathBuf), CoreError> {
        let manifest = parse_manifest_file(manifest_path)?;
        let normalized = manifest.normalize()?;
        let project_dir = project_dir(manifest_path)?;
        let identity = compute_env_id(&normalized, &project_dir)?;
        Ok((manifest, normalized, identity, project_dir))
    }

    pub fn provision(&self, manifest_path: &Path) -> Result<ProvisionResult, CoreError> {
        self.provision_with_options(manifest_path, &ProvisionOptions::default())
    }

    /// Resolve and install the declared packages, then run `onCreate` once.
    ///
    /// Resolution and install failures leave nothing behind. An `onCreate`
    /// failure leaves the environment in `failed` state with its report.
    pub fn provision_with_options(
        &self,
        manifest_path: &Path,
        options: &ProvisionOptions,
    ) -> Result<ProvisionResult, CoreError> {
        info!("provisioning environment from {}", manifest_path.display());
        self.layout.initialize()?;

        let (_, normalized, identity, project_dir) = self.resolve_manifest(manifest_path)?;
        let env_id = identity.env_id.to_string();

        // Metadata written but `onCreate` never began: finish the job below.
        let resuming = match self.meta_store.get(&env_id) {
            Ok(existing) if existing.state == EnvState::Resolved && existing.create_runs == 0 => {
                true
            }
            Ok(existing) => {
                return Err(CoreError::AlreadyProvisioned {
                    env_id,
                    state: existing.state.to_string(),
                });
            }
            Err(_) => false,
        };

        if let Some(name) = &options.name {
            validate_env_name(name)?;
            if let Ok(other) = self.meta_store.get_by_name(name) {
                if *other.env_id != *env_id {
                    return Err(sprout_store::StoreError::NameConflict {
                        name: name.clone(),
                        existing_env_id: other.short_id.to_string(),
                    }
                    .into());
                }
            }
        }

        let lock_path = lock_path(manifest_path);
        let locked = if options.locked {
            let lock = LockFile::read_from_file(&lock_path)?;
            lock.verify_integrity()?;
            lock.verify_manifest_intent(&normalized)?;
            Some(lock)
        } else {
            None
        };

        let backend = select_backend(&normalized.runtime_backend, self.layout.root())?;
        let resolution = backend
            .resolve(&normalized.channel, &normalized.packages)
            .map_err(CoreError::Resolution)?;
        debug!(
            "resolved {} packages on channel {}",
            resolution.packages.len(),
            resolution.channel
        );
        if let Some(lock) = &locked {
            lock.verify_resolution(&resolution)?;
        }
        let lock_file = LockFile::from_resolved(&normalized, &identity, &resolution);
        let handle = EnvironmentHandle::new(&self.layout, &env_id, &project_dir);

        if resuming {
            info!("resuming onCreate for {}", identity.short_id);
            if options.name.is_some() {
                self.meta_store.update_name(&env_id, options.name.clone())?;
            }
        } else {
            info!(
                "canonical env_id: {} ({})",
                identity.env_id, identity.short_id
            );
            self.install(&identity, &normalized, &project_dir, &handle, options, |h| {
                backend.install(h, &resolution)
            })?;
        }

        let create_report = self.run_create(&env_id, &normalized, &handle)?;

        if !options.locked {
            lock_file.write_to_file(&lock_path)?;
        }

        Ok(ProvisionResult {
            identity,
            lock_file,
            create_report,
            handle,
        })
    }

    /// Install packages and record `resolved` metadata under one WAL entry.
    fn install<F>(
        &self,
        identity: &EnvIdentity,
        normalized: &NormalizedManifest,
        project_dir: &Path,
        handle: &EnvironmentHandle,
        options: &ProvisionOptions,
        install: F,
    ) -> Result<(), CoreError>
    where
        F: FnOnce(&EnvironmentHandle) -> Result<(), sprout_runtime::RuntimeError>,
    {
        let env_id = identity.env_id.as_str();

        self.wal.initialize()?;
        let wal_op = self.wal.begin(WalOpKind::Provision, env_id)?;
        // Register rollback before creating side effects.
        self.wal
            .add_rollback_step(&wal_op, RollbackStep::RemoveDir(handle.root.clone()))?;

        if let Err(e) = install(handle) {
            warn!("install failed, removing {}: {e}", handle.root.display());
            let _ = handle.teardown();
            let _ = self.wal.commit(&wal_op);
            return Err(CoreError::Resolution(e));
        }

        let manifest_json = normalized.canonical_json()?;
        let manifest_hash = self.obj_store.put(manifest_json.as_bytes())?;

        let now = chrono::Utc::now().to_rfc3339();
        let meta = EnvMetadata {
            env_id: identity.env_id.clone(),
            short_id: identity.short_id.clone(),
            name: options.name.clone(),
            state: EnvState::Resolved,
            manifest_hash: ObjectHash::new(manifest_hash),
            project_dir: project_dir.to_path_buf(),
            channel: normalized.channel.clone(),
            backend: normalized.runtime_backend.clone(),
            created_at: now.clone(),
            updated_at: now,
            create_runs: 0,
            start_count: 0,
            last_create: None,
            last_start: None,
            checksum: None,
        };
        self.wal.add_rollback_step(
            &wal_op,
            RollbackStep::RemoveFile(self.layout.metadata_dir().join(env_id)),
        )?;
        if let Err(e) = self.meta_store.put(&meta) {
            let _ = handle.teardown();
            let _ = self.release_manifest(&meta.manifest_hash);
            let _ = self.wal.commit(&wal_op);
            return Err(e.into());
        }
        self.wal.commit(&wal_op)?;
        Ok(())
    }

    /// Run `onCreate` for a `resolved` environment. `create_runs` is bumped
    /// before the first hook so a crash can never lead to a second run.
    fn run_create(
        &self,
        env_id: &str,
        normalized: &NormalizedManifest,
        handle: &EnvironmentHandle,
    ) -> Result<PhaseReport, CoreError> {
        let wal_op = self.wal.begin(WalOpKind::Create, env_id)?;
        self.wal.add_rollback_step(
            &wal_op,
            RollbackStep::ResetState {
                env_id: env_id.to_owned(),
                target_state: EnvState::Failed,
                only_from: Some(EnvState::Resolved),
            },
        )?;
        self.meta_store.update(env_id, |m| m.create_runs += 1)?;

        let hooks = normalized.hooks(Phase::OnCreate);
        info!("running {} onCreate hook(s)", hooks.len());
        let report = HookExecutor::new(handle).run_phase(
            Phase::OnCreate,
            hooks,
            FailurePolicy::for_phase(Phase::OnCreate, normalized.on_start_failure),
        );

        let target = if report.succeeded() {
            EnvState::Created
        } else {
            EnvState::Failed
        };
        validate_transition(EnvState::Resolved, target)?;
        self.meta_store.update(env_id, |m| {
            m.state = target;
            m.record_report(report.clone());
        })?;
        self.wal.commit(&wal_op)?;

        match phase_error(&report) {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Run `onStart` on a `created` or `started` environment.
    ///
    /// Executes the manifest stored at provisioning time, not the current file.
    pub fn start(&self, env_id: &str) -> Result<StartResult, CoreError> {
        info!("starting environment {env_id}");
        let meta = self.get_meta(env_id)?;
        if !can_start(meta.state) {
            return Err(CoreError::InvalidTransition {
                from: meta.state.to_string(),
                to: "start requires a created environment; destroy and provision again"
                    .to_owned(),
            });
        }

        let normalized = self.load_manifest(&meta.manifest_hash)?;
        let handle = EnvironmentHandle::new(&self.layout, env_id, &meta.project_dir);
        if !handle.exists() {
            warn!(
                "environment root {} is missing; hooks run without profile binaries",
                handle.root.display()
            );
        }

        self.wal.initialize()?;
        let wal_op = self.wal.begin(WalOpKind::Start, env_id)?;
        self.wal.add_rollback_step(
            &wal_op,
            RollbackStep::ResetState {
                env_id: env_id.to_owned(),
                target_state: meta.state,
                only_from: None,
            },
        )?;
        let meta = self.meta_store.update(env_id, |m| m.start_count += 1)?;

        let hooks = normalized.hooks(Phase::OnStart);
        info!("running {} onStart hook(s)", hooks.len());
        let report = HookExecutor::new(&handle).run_phase(
            Phase::OnStart,
            hooks,
            FailurePolicy::for_phase(Phase::OnStart, normalized.on_start_failure),
        );

        let succeeded = report.succeeded();
        if succeeded {
            validate_transition(meta.state, EnvState::Started)?;
        }
        self.meta_store.update(env_id, |m| {
            if succeeded {
                m.state = EnvState::Started;
            }
            m.record_report(report.clone());
        })?;
        self.wal.commit(&wal_op)?;

        if let Some(e) = phase_error(&report) {
            return Err(e);
        }
        Ok(StartResult {
            env_id: env_id.to_owned(),
            report,
            start_count: meta.start_count,
        })
    }

    /// Provision the manifest's environment if it does not exist yet, then start it.
    pub fn up(
        &self,
        manifest_path: &Path,
        options: &ProvisionOptions,
    ) -> Result<UpResult, CoreError> {
        let (_, _, identity, _) = self.resolve_manifest(manifest_path)?;
        let needs_provision = match self.meta_store.get(&identity.env_id) {
            Ok(meta) => meta.state == EnvState::Resolved && meta.create_runs == 0,
            Err(_) => true,
        };

        let provisioned = if needs_provision {
            Some(self.provision_with_options(manifest_path, options)?)
        } else {
            debug!("{} already provisioned", identity.short_id);
            None
        };
        let start = self.start(&identity.env_id)?;
        Ok(UpResult {
            identity,
            provisioned,
            start,
        })
    }

    /// Tear down the environment root and metadata. Allowed from every state.
    pub fn destroy(&self, env_id: &str) -> Result<(), CoreError> {
        info!("destroying environment {env_id}");
        let meta = self.get_meta(env_id)?;
        let backend = select_backend(&meta.backend, self.layout.root())?;
        let handle = EnvironmentHandle::new(&self.layout, env_id, &meta.project_dir);

        self.wal.initialize()?;
        let wal_op = self.wal.begin(WalOpKind::Destroy, env_id)?;
        // Re-running destroy on an already-destroyed env is safe.
        self.wal
            .add_rollback_step(&wal_op, RollbackStep::RemoveDir(handle.root.clone()))?;

        if let Err(e) = backend.destroy(&handle) {
            let _ = self.wal.commit(&wal_op);
            return Err(e.into());
        }

        let metadata_path = self.layout.metadata_dir().join(env_id);
        self.wal
            .add_rollback_step(&wal_op, RollbackStep::RemoveFile(metadata_path))?;
        self.meta_store.remove(env_id)?;
        self.release_manifest(&meta.manifest_hash)?;

        self.wal.commit(&wal_op)?;
        Ok(())
    }

    /// Remove a manifest object once no environment references it.
    fn release_manifest(&self, manifest_hash: &str) -> Result<(), CoreError> {
        let still_referenced = self
            .meta_store
            .list()?
            .iter()
            .any(|m| m.manifest_hash == *manifest_hash);
        if !still_referenced {
            self.obj_store.remove(manifest_hash)?;
        }
        Ok(())
    }

    pub fn inspect(&self, env_id: &str) -> Result<EnvMetadata, CoreError> {
        self.get_meta(env_id)
    }

    pub fn list(&self) -> Result<Vec<EnvMetadata>, CoreError> {
        Ok(self.meta_store.list()?)
    }

    /// The normalized manifest an environment was provisioned from.
    pub fn stored_manifest(&self, env_id: &str) -> Result<NormalizedManifest, CoreError> {
        let meta = self.get_meta(env_id)?;
        self.load_manifest(&meta.manifest_hash)
    }

    pub fn set_name(&self, env_id: &str, name: Option<String>) -> Result<(), CoreError> {
        self.get_meta(env_id)?;
        self.meta_store.update_name(env_id, name)?;
        Ok(())
    }

    pub fn rename(&self, env_id: &str, new_name: &str) -> Result<(), CoreError> {
        info!("renaming environment {env_id} to '{new_name}'");
        self.set_name(env_id, Some(new_name.to_owned()))
    }

    pub fn previews(&self, env_id: &str) -> Result<PreviewRegistry, CoreError> {
        Ok(self.stored_manifest(env_id)?.previews)
    }

    /// Spawn a declared preview inside the environment. The caller owns the child.
    pub fn launch_preview(&self, env_id: &str, preview_id: &str) -> Result<Child, CoreError> {
        let meta = self.get_meta(env_id)?;
        if !can_start(meta.state) {
            return Err(CoreError::InvalidTransition {
                from: meta.state.to_string(),
                to: "previews require a created environment".to_owned(),
            });
        }
        let registry = self.load_manifest(&meta.manifest_hash)?.previews;
        let not_found = || CoreError::PreviewNotFound {
            env_id: meta.short_id.to_string(),
            id: preview_id.to_owned(),
        };
        let descriptor = match registry.launchable().iter().find(|p| p.id == preview_id) {
            Some(descriptor) => descriptor,
            None if registry.get(preview_id).is_some() => {
                return Err(CoreError::PreviewsDisabled(meta.short_id.to_string()));
            }
            None => return Err(not_found()),
        };
        let command = descriptor.to_command().ok_or_else(not_found)?;

        info!("launching preview '{preview_id}' ({}): {command}", descriptor.manager);
        let handle = EnvironmentHandle::new(&self.layout, env_id, &meta.project_dir);
        Ok(ProcessRunner::new(&handle)
            .env(PREVIEW_VAR, preview_id)
            .spawn(&command)?)
    }

    fn get_meta(&self, env_id: &str) -> Result<EnvMetadata, CoreError> {
        self.meta_store
            .get(env_id)
            .map_err(|_| CoreError::EnvNotFound(env_id.to_owned()))
    }

    fn load_manifest(&self, manifest_hash: &str) -> Result<NormalizedManifest, CoreError> {
        let data = self.obj_store.get(manifest_hash)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

fn project_dir(manifest_path: &Path) -> Result<PathBuf, CoreError> {
    let absolute = std::fs::canonicalize(manifest_path)?;
    Ok(absolute
        .parent()
        .map_or_else(|| PathBuf::from("/"), Path::to_path_buf))
}

fn lock_path(manifest_path: &Path) -> PathBuf {
    manifest_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(LOCK_FILE)
}
