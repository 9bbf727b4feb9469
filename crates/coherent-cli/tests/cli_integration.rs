//! CLI subprocess integration tests.
//!
//! These tests invoke the `coherent` binary against a temporary root with the
//! file registry and verify exit codes, JSON reports and on-disk state.

use coherent_runtime::{FileRegistry, ModuleRegistry};
use coherent_store::{SettingsLockGuard, StoreLayout};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn coherent_bin(root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_coherent"));
    cmd.arg("--root").arg(root);
    cmd.env_remove("COHERENT_LOG");
    cmd
}

fn run(root: &Path, args: &[&str]) -> Output {
    coherent_bin(root).args(args).output().unwrap()
}

fn code(output: &Output) -> i32 {
    output.status.code().unwrap()
}

/// Root with `ldap-connector` stopped and `auth.properties` holding
/// `timeout=10`, `retries=3`.
fn seeded_root() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let layout = StoreLayout::new(root.path());
    layout.initialize().unwrap();
    FileRegistry::new(layout.registry_file())
        .register("ldap-connector", false)
        .unwrap();
    std::fs::write(
        layout.settings_path("auth.properties"),
        "# seeded\ntimeout=10\nretries=3\n",
    )
    .unwrap();
    root
}

fn write_plan(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("plan.toml");
    std::fs::write(&path, format!("plan_version = 1\n{body}")).unwrap();
    path
}

const SCENARIO_PLAN: &str = r#"
[[change]]
kind = "module"
module = "ldap-connector"
running = true

[[change]]
kind = "settings"
store = "auth.properties"
policy = "update"
merge = true
values = { timeout = "30" }
"#;

fn show_json(root: &Path, store: &str) -> serde_json::Value {
    let output = run(root, &["show", store, "--json"]);
    assert_eq!(code(&output), 0, "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

fn module_running(root: &Path, module: &str) -> bool {
    FileRegistry::new(StoreLayout::new(root).registry_file())
        .is_running(module)
        .unwrap()
}

#[test]
fn cli_version_exits_zero() {
    let root = tempfile::tempdir().unwrap();
    let output = run(root.path(), &["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("coherent"));
}

#[test]
fn cli_help_lists_commands() {
    let root = tempfile::tempdir().unwrap();
    let output = run(root.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["apply", "check", "status", "show"] {
        assert!(stdout.contains(command), "help must list '{command}'");
    }
}

#[test]
fn apply_commits_scenario() {
    let root = seeded_root();
    let plan = write_plan(root.path(), SCENARIO_PLAN);

    let output = run(
        root.path(),
        &["apply", plan.to_str().unwrap(), "--yes", "--json"],
    );
    assert_eq!(code(&output), 0, "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "committed");
    assert_eq!(report["unit_results"].as_array().unwrap().len(), 2);
    assert!(report["compensation_errors"].as_array().unwrap().is_empty());

    assert!(module_running(root.path(), "ldap-connector"));
    assert_eq!(
        show_json(root.path(), "auth.properties"),
        serde_json::json!({ "timeout": "30", "retries": "3" })
    );
}

#[test]
fn apply_rolls_back_when_store_locked() {
    let root = seeded_root();
    let plan = write_plan(root.path(), SCENARIO_PLAN);
    let guard =
        SettingsLockGuard::try_acquire(&StoreLayout::new(root.path()), "auth.properties").unwrap();

    let output = run(
        root.path(),
        &["apply", plan.to_str().unwrap(), "--yes", "--json"],
    );
    drop(guard);
    assert_eq!(code(&output), 1);

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "rolled_back");
    assert_eq!(report["unit_results"][0]["compensated"], true);
    assert_eq!(report["unit_results"][1]["success"], false);
    assert!(report["unit_results"][1]["error"]
        .as_str()
        .unwrap()
        .contains("locked"));

    assert!(!module_running(root.path(), "ldap-connector"));
    assert_eq!(
        show_json(root.path(), "auth.properties"),
        serde_json::json!({ "timeout": "10", "retries": "3" })
    );
}

#[test]
fn apply_reports_partial_rollback_for_sticky_module() {
    let root = seeded_root();
    FileRegistry::new(StoreLayout::new(root.path()).registry_file())
        .set_sticky("ldap-connector", true)
        .unwrap();
    let plan = write_plan(root.path(), SCENARIO_PLAN);
    let guard =
        SettingsLockGuard::try_acquire(&StoreLayout::new(root.path()), "auth.properties").unwrap();

    let output = run(
        root.path(),
        &["apply", plan.to_str().unwrap(), "--yes", "--json"],
    );
    drop(guard);
    assert_eq!(code(&output), 5);

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "partially_rolled_back");
    let errors = report["compensation_errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["unit"], "module 'ldap-connector'");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("could not be restored"), "{stderr}");
    assert!(stderr.contains("module 'ldap-connector'"), "{stderr}");

    assert!(module_running(root.path(), "ldap-connector"));
    assert_eq!(
        show_json(root.path(), "auth.properties"),
        serde_json::json!({ "timeout": "10", "retries": "3" })
    );
}

#[test]
fn create_on_existing_store_is_precondition_failure() {
    let root = seeded_root();
    let plan = write_plan(
        root.path(),
        r#"
[[change]]
kind = "module"
module = "ldap-connector"
running = true

[[change]]
kind = "settings"
store = "auth.properties"
policy = "create"
values = { timeout = "30" }
"#,
    );

    let output = run(root.path(), &["apply", plan.to_str().unwrap(), "--yes"]);
    assert_eq!(code(&output), 4);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("precondition failed"), "{stderr}");
    assert!(stderr.contains("change #1"), "{stderr}");
    assert!(!module_running(root.path(), "ldap-connector"));
}

#[test]
fn unknown_module_is_precondition_failure() {
    let root = seeded_root();
    let plan = write_plan(
        root.path(),
        "[[change]]\nkind = \"module\"\nmodule = \"ghost\"\nrunning = true\n",
    );
    let output = run(root.path(), &["check", plan.to_str().unwrap()]);
    assert_eq!(code(&output), 4);
}

#[test]
fn invalid_plan_exits_with_plan_error() {
    let root = seeded_root();
    let plan = write_plan(
        root.path(),
        r#"
[[change]]
kind = "settings"
store = "auth.properties"
policy = "delete"
values = { timeout = "30" }
"#,
    );
    let output = run(root.path(), &["apply", plan.to_str().unwrap(), "--yes"]);
    assert_eq!(code(&output), 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("plan error"));

    let missing = root.path().join("missing.toml");
    let output = run(root.path(), &["check", missing.to_str().unwrap()]);
    assert_eq!(code(&output), 2);
}

#[test]
fn apply_without_yes_refuses_when_not_interactive() {
    let root = seeded_root();
    let plan = write_plan(root.path(), SCENARIO_PLAN);
    let output = run(root.path(), &["apply", plan.to_str().unwrap()]);
    assert_eq!(code(&output), 1);
    assert!(String::from_utf8_lossy(&output.stderr).contains("--yes"));
    assert!(!module_running(root.path(), "ldap-connector"));
}

#[test]
fn check_does_not_mutate() {
    let root = seeded_root();
    let plan = write_plan(root.path(), SCENARIO_PLAN);
    let output = run(root.path(), &["check", plan.to_str().unwrap(), "--json"]);
    assert_eq!(code(&output), 0, "{}", String::from_utf8_lossy(&output.stderr));

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["digest"].as_str().unwrap().len(), 64);
    assert_eq!(payload["changes"][0]["unit"], "module 'ldap-connector'");
    assert_eq!(payload["changes"][0]["current"]["running"], false);
    assert_eq!(payload["changes"][1]["current"]["content"]["timeout"], "10");

    assert!(!module_running(root.path(), "ldap-connector"));
}

#[test]
fn status_lists_modules_and_stores() {
    let root = seeded_root();
    let output = run(root.path(), &["status", "--json"]);
    assert_eq!(code(&output), 0, "{}", String::from_utf8_lossy(&output.stderr));
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["registry"], "file");
    assert_eq!(payload["modules"][0]["module_id"], "ldap-connector");
    assert_eq!(payload["settings"][0]["store"], "auth.properties");
    assert_eq!(payload["settings"][0]["keys"], 2);
}

#[test]
fn show_missing_store_is_store_error() {
    let root = seeded_root();
    let output = run(root.path(), &["show", "absent.properties"]);
    assert_eq!(code(&output), 3);
}

#[test]
fn apply_fails_while_transaction_lock_held() {
    let root = seeded_root();
    let plan = write_plan(root.path(), SCENARIO_PLAN);
    let _lock =
        coherent_core::TransactionLock::acquire(&StoreLayout::new(root.path()).lock_file())
            .unwrap();
    let output = run(root.path(), &["apply", plan.to_str().unwrap(), "--yes"]);
    assert_eq!(code(&output), 3);
    assert!(String::from_utf8_lossy(&output.stderr).contains("another transaction"));
}
