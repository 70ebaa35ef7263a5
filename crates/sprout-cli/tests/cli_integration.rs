//! CLI subprocess integration tests.
//!
//! These tests invoke the `sprout` binary as a subprocess and verify exit
//! codes, stdout content, and JSON output stability.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn sprout_bin(store: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sprout"));
    cmd.arg("--store").arg(store);
    cmd.env_remove("SPROUT_LOG");
    cmd
}

fn write_manifest(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("sprout.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn hooked_manifest(create_exit: i32) -> String {
    format!(
        r#"manifest_version = 1
channel = "stable"
packages = ["git"]

[runtime]
backend = "mock"

[[hooks.onCreate]]
name = "setup"
command = ["sh", "-c", "echo setup >> log; exit {create_exit}"]

[[hooks.onStart]]
name = "serve"
command = ["sh", "-c", "echo serve >> log"]
"#
    )
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn log_lines(project: &Path) -> Vec<String> {
    std::fs::read_to_string(project.join("log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn cli_version_exits_zero() {
    let store = tempfile::tempdir().unwrap();
    let output = sprout_bin(store.path()).arg("--version").output().unwrap();
    assert!(output.status.success(), "sprout --version must exit 0");
    assert!(String::from_utf8_lossy(&output.stdout).contains("sprout"));
}

#[test]
fn cli_help_lists_lifecycle_commands() {
    let store = tempfile::tempdir().unwrap();
    let output = sprout_bin(store.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["provision", "start", "up", "destroy", "previews"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}'");
    }
}

#[test]
fn cli_validate_reports_identity_without_store_writes() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path(), &hooked_manifest(0));

    let output = sprout_bin(store.path())
        .args(["--json", "validate"])
        .arg(&manifest)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value = json(&output);
    assert_eq!(value["status"], "valid");
    assert_eq!(value["env_id"].as_str().unwrap().len(), 64);
    assert_eq!(value["manifest"]["on_create"][0]["name"], "setup");
    assert!(!store.path().join("store").exists());
    assert!(log_lines(project.path()).is_empty());
}

#[test]
fn cli_unknown_phase_exits_with_manifest_error() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(
        project.path(),
        r#"manifest_version = 1
channel = "stable"

[[hooks.onDestroy]]
name = "cleanup"
command = "true"
"#,
    );

    let output = sprout_bin(store.path())
        .arg("provision")
        .arg(&manifest)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("manifest error"), "{stderr}");
}

#[test]
fn cli_unknown_package_exits_with_resolution_error() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(
        project.path(),
        &hooked_manifest(0).replace(r#"["git"]"#, r#"["git", "not-a-package"]"#),
    );

    let output = sprout_bin(store.path())
        .arg("provision")
        .arg(&manifest)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not-a-package"), "{stderr}");
    assert!(log_lines(project.path()).is_empty());
}

#[test]
fn cli_failing_on_create_exits_with_hook_failure() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path(), &hooked_manifest(7));

    let output = sprout_bin(store.path())
        .arg("provision")
        .arg(&manifest)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("onCreate hook 'setup'"), "{stderr}");

    let list = sprout_bin(store.path())
        .args(["--json", "list"])
        .output()
        .unwrap();
    assert_eq!(json(&list)[0]["state"], "Failed");
}

#[test]
fn cli_provision_start_inspect_destroy() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path(), &hooked_manifest(0));

    let provision = sprout_bin(store.path())
        .args(["--json", "provision"])
        .arg(&manifest)
        .args(["--name", "demo"])
        .output()
        .unwrap();
    assert!(
        provision.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&provision.stderr)
    );
    let value = json(&provision);
    assert_eq!(value["status"], "created");
    assert_eq!(value["packages"][0]["name"], "git");
    assert!(project.path().join("sprout.lock").exists());

    for expected_count in 1..=2 {
        let start = sprout_bin(store.path())
            .args(["--json", "start", "demo"])
            .output()
            .unwrap();
        assert!(start.status.success());
        assert_eq!(json(&start)["start_count"], expected_count);
    }
    assert_eq!(log_lines(project.path()), vec!["setup", "serve", "serve"]);

    let inspect = sprout_bin(store.path())
        .args(["--json", "inspect", "demo"])
        .output()
        .unwrap();
    let meta = json(&inspect);
    assert_eq!(meta["state"], "Started");
    assert_eq!(meta["create_runs"], 1);
    assert_eq!(meta["last_start"]["hooks"][0]["status"]["kind"], "succeeded");

    let destroy = sprout_bin(store.path())
        .args(["destroy", "demo"])
        .output()
        .unwrap();
    assert!(destroy.status.success());

    let list = sprout_bin(store.path())
        .args(["--json", "list"])
        .output()
        .unwrap();
    assert_eq!(json(&list), serde_json::json!([]));
}

#[test]
fn cli_up_is_idempotent_for_on_create() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path(), &hooked_manifest(0));

    let first = sprout_bin(store.path())
        .args(["--json", "up"])
        .arg(&manifest)
        .output()
        .unwrap();
    assert!(first.status.success());
    assert_eq!(json(&first)["provisioned"], true);

    let second = sprout_bin(store.path())
        .args(["--json", "up"])
        .arg(&manifest)
        .output()
        .unwrap();
    assert!(second.status.success());
    assert_eq!(json(&second)["provisioned"], false);
    assert_eq!(log_lines(project.path()), vec!["setup", "serve", "serve"]);
}

#[test]
fn cli_start_unknown_env_fails() {
    let store = tempfile::tempdir().unwrap();
    let output = sprout_bin(store.path())
        .args(["start", "nope"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no environment matching"));
}

#[test]
fn cli_new_writes_template_and_refuses_overwrite() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();

    let output = sprout_bin(store.path())
        .current_dir(project.path())
        .args(["new", "--template", "python"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let content = std::fs::read_to_string(project.path().join("sprout.toml")).unwrap();
    assert!(content.contains("python3"));

    let again = sprout_bin(store.path())
        .current_dir(project.path())
        .args(["new", "--template", "node"])
        .output()
        .unwrap();
    assert!(!again.status.success());

    let forced = sprout_bin(store.path())
        .current_dir(project.path())
        .args(["new", "--template", "node", "--force"])
        .output()
        .unwrap();
    assert!(forced.status.success());
    let content = std::fs::read_to_string(project.path().join("sprout.toml")).unwrap();
    assert!(content.contains("nodejs"));
}

#[test]
fn cli_previews_listed_and_launched() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(
        project.path(),
        r#"manifest_version = 1
channel = "stable"

[runtime]
backend = "mock"

[previews]
enable = true

[[previews.entries]]
id = "web"
command = ["sh", "-c", "echo $PORT > port.out", "$PORT"]
port = 8123
"#,
    );

    let provision = sprout_bin(store.path())
        .args(["--json", "provision"])
        .arg(&manifest)
        .output()
        .unwrap();
    let env_id = json(&provision)["short_id"].as_str().unwrap().to_owned();

    let previews = sprout_bin(store.path())
        .args(["--json", "previews", &env_id])
        .output()
        .unwrap();
    let registry = json(&previews);
    assert_eq!(registry["enabled"], true);
    assert_eq!(registry["previews"][0]["id"], "web");

    let launch = sprout_bin(store.path())
        .args(["preview", &env_id, "web"])
        .output()
        .unwrap();
    assert!(
        launch.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&launch.stderr)
    );
    assert_eq!(
        std::fs::read_to_string(project.path().join("port.out"))
            .unwrap()
            .trim(),
        "8123"
    );
}

#[test]
fn cli_completions_and_man_pages() {
    let store = tempfile::tempdir().unwrap();
    let completions = sprout_bin(store.path())
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(completions.status.success());
    assert!(String::from_utf8_lossy(&completions.stdout).contains("sprout"));

    let out = tempfile::tempdir().unwrap();
    let man = sprout_bin(store.path())
        .arg("man-pages")
        .arg(out.path())
        .output()
        .unwrap();
    assert!(man.status.success());
    assert!(out.path().join("sprout.1").exists());
    assert!(out.path().join("sprout-provision.1").exists());
}
