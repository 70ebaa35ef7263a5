//! Recovery of operations interrupted between their first side effect and
//! their WAL commit. Each test leaves the store as a crash would, then
//! constructs a fresh `Engine`, which replays the WAL.

use sprout_core::{CoreError, Engine};
use sprout_store::{
    EnvState, MetadataStore, RollbackStep, StoreLayout, WalOpKind, WriteAheadLog,
};
use std::fs;
use std::path::{Path, PathBuf};

fn write_manifest(dir: &Path) -> PathBuf {
    let path = dir.join("sprout.toml");
    fs::write(
        &path,
        r#"
manifest_version = 1
channel = "stable"
packages = ["git"]
[runtime]
backend = "mock"

[[hooks.onCreate]]
name = "setup"
command = ["sh", "-c", "echo setup >> log"]

[[hooks.onStart]]
name = "serve"
command = ["sh", "-c", "echo serve >> log"]
"#,
    )
    .unwrap();
    path
}

fn log_lines(project: &Path) -> usize {
    fs::read_to_string(project.join("log"))
        .unwrap_or_default()
        .lines()
        .count()
}

fn assert_wal_clean(layout: &StoreLayout) {
    let incomplete = WriteAheadLog::new(layout).list_incomplete().unwrap();
    assert!(
        incomplete.is_empty(),
        "WAL must be clean after recovery, found {} incomplete entries",
        incomplete.len()
    );
}

#[test]
fn interrupted_provision_leaves_no_environment() {
    let store = tempfile::tempdir().unwrap();
    let layout = StoreLayout::new(store.path());
    layout.initialize().unwrap();

    let env_id = "a".repeat(64);
    let env_root = layout.env_path(&env_id);
    let meta_file = layout.metadata_dir().join(&env_id);

    let wal = WriteAheadLog::new(&layout);
    wal.initialize().unwrap();
    let op = wal.begin(WalOpKind::Provision, &env_id).unwrap();
    wal.add_rollback_step(&op, RollbackStep::RemoveDir(env_root.clone()))
        .unwrap();
    fs::create_dir_all(env_root.join("profile/bin")).unwrap();
    wal.add_rollback_step(&op, RollbackStep::RemoveFile(meta_file.clone()))
        .unwrap();
    fs::write(&meta_file, "{ half written").unwrap();

    let engine = Engine::new(store.path());
    assert!(!env_root.exists());
    assert!(!meta_file.exists());
    assert!(engine.list().unwrap().is_empty());
    assert_wal_clean(&layout);
}

#[test]
fn interrupted_create_never_reruns_on_create() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let layout = StoreLayout::new(store.path());

    let env_id = {
        let engine = Engine::new(store.path());
        engine.provision(&manifest).unwrap().identity.env_id
    };
    assert_eq!(log_lines(project.path()), 1);

    // Crash while onCreate was running: runs were counted, state not yet final.
    let meta_store = MetadataStore::new(layout.clone());
    meta_store
        .update(&env_id, |m| {
            m.state = EnvState::Resolved;
            m.create_runs = 1;
        })
        .unwrap();
    let wal = WriteAheadLog::new(&layout);
    let op = wal.begin(WalOpKind::Create, &env_id).unwrap();
    wal.add_rollback_step(
        &op,
        RollbackStep::ResetState {
            env_id: env_id.to_string(),
            target_state: EnvState::Failed,
            only_from: Some(EnvState::Resolved),
        },
    )
    .unwrap();

    let engine = Engine::new(store.path());
    assert_wal_clean(&layout);
    assert_eq!(engine.inspect(&env_id).unwrap().state, EnvState::Failed);

    assert!(matches!(
        engine.provision(&manifest),
        Err(CoreError::AlreadyProvisioned { .. })
    ));
    assert!(matches!(
        engine.start(&env_id),
        Err(CoreError::InvalidTransition { .. })
    ));
    assert_eq!(log_lines(project.path()), 1);
}

#[test]
fn crash_after_on_create_finished_keeps_created_state() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let layout = StoreLayout::new(store.path());

    let env_id = {
        let engine = Engine::new(store.path());
        engine.provision(&manifest).unwrap().identity.env_id
    };

    // Final state recorded, but the create entry was never committed.
    let wal = WriteAheadLog::new(&layout);
    let op = wal.begin(WalOpKind::Create, &env_id).unwrap();
    wal.add_rollback_step(
        &op,
        RollbackStep::ResetState {
            env_id: env_id.to_string(),
            target_state: EnvState::Failed,
            only_from: Some(EnvState::Resolved),
        },
    )
    .unwrap();

    let engine = Engine::new(store.path());
    assert_wal_clean(&layout);
    let meta = engine.inspect(&env_id).unwrap();
    assert_eq!(meta.state, EnvState::Created);
    assert!(meta.last_create.unwrap().succeeded());

    engine.start(&env_id).unwrap();
    assert_eq!(log_lines(project.path()), 2);
}

#[test]
fn crash_before_on_create_resumes_exactly_once() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let layout = StoreLayout::new(store.path());

    let engine = Engine::new(store.path());
    let env_id = engine.provision(&manifest).unwrap().identity.env_id;

    // Provisioning committed but onCreate never began.
    MetadataStore::new(layout.clone())
        .update(&env_id, |m| {
            m.state = EnvState::Resolved;
            m.create_runs = 0;
            m.last_create = None;
        })
        .unwrap();
    fs::remove_file(project.path().join("log")).unwrap();

    let resumed = engine.provision(&manifest).unwrap();
    assert!(resumed.create_report.succeeded());
    assert_eq!(log_lines(project.path()), 1);

    let meta = engine.inspect(&env_id).unwrap();
    assert_eq!(meta.state, EnvState::Created);
    assert_eq!(meta.create_runs, 1);

    assert!(engine.provision(&manifest).is_err());
    assert_eq!(log_lines(project.path()), 1);
}

#[test]
fn interrupted_start_restores_prior_state() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let layout = StoreLayout::new(store.path());

    let env_id = {
        let engine = Engine::new(store.path());
        engine.provision(&manifest).unwrap().identity.env_id
    };

    let wal = WriteAheadLog::new(&layout);
    let op = wal.begin(WalOpKind::Start, &env_id).unwrap();
    wal.add_rollback_step(
        &op,
        RollbackStep::ResetState {
            env_id: env_id.to_string(),
            target_state: EnvState::Created,
            only_from: None,
        },
    )
    .unwrap();
    MetadataStore::new(layout.clone())
        .update_state(&env_id, EnvState::Started)
        .unwrap();

    let engine = Engine::new(store.path());
    assert_wal_clean(&layout);
    assert_eq!(engine.inspect(&env_id).unwrap().state, EnvState::Created);

    engine.start(&env_id).unwrap();
    assert_eq!(engine.inspect(&env_id).unwrap().state, EnvState::Started);
}

#[test]
fn interrupted_destroy_can_be_repeated() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let layout = StoreLayout::new(store.path());

    let env_id = {
        let engine = Engine::new(store.path());
        engine.provision(&manifest).unwrap().identity.env_id
    };
    let env_root = layout.env_path(&env_id);
    assert!(env_root.exists());

    let wal = WriteAheadLog::new(&layout);
    let op = wal.begin(WalOpKind::Destroy, &env_id).unwrap();
    wal.add_rollback_step(&op, RollbackStep::RemoveDir(env_root.clone()))
        .unwrap();

    let engine = Engine::new(store.path());
    assert_wal_clean(&layout);
    assert!(!env_root.exists());

    // Metadata survived the crash; finishing the destroy still works.
    engine.destroy(&env_id).unwrap();
    assert!(engine.list().unwrap().is_empty());
}
