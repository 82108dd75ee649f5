//! Integration tests for `lockstep --json` output.
//!
//! None of these need yarn: every scenario is either read-only, already
//! consistent, or rejected before anything is resolved.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const LOCK_HEADER: &str = "# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.\n# yarn lockfile v1\n\n";

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "lockstep-cli", "--bin", "lockstep", "--"]);
    // Fail loudly if anything tries to resolve
    cmd.env("LOCKSTEP_YARN", "/nonexistent/yarn");
    cmd
}

fn run_json(cwd: &Path, args: &[&str]) -> (Output, serde_json::Value) {
    let output = cargo_bin()
        .arg("--json")
        .arg("--cwd")
        .arg(cwd)
        .args(args)
        .output()
        .expect("Failed to run lockstep");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("stdout should be valid JSON ({e}): {stdout}"));
    (output, json)
}

fn write(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

/// A project whose files are exactly what lockstep itself would write.
fn consistent_project(dir: &Path, name: &str) {
    write(
        dir,
        "package.json",
        &format!("{{\n  \"name\": \"{name}\",\n  \"dependencies\": {{\n    \"no-bugs\": \"1.0.0\"\n  }}\n}}\n"),
    );
    write(
        dir,
        "yarn.lock",
        &format!(
            "{LOCK_HEADER}\nno-bugs@1.0.0:\n  version \"1.0.0\"\n  resolved \"https://registry.example.test/no-bugs/-/no-bugs-1.0.0.tgz\"\n"
        ),
    );
}

#[test]
fn test_version_json() {
    let output = cargo_bin()
        .args(["--json", "version"])
        .output()
        .expect("Failed to run version command");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["name"], "lockstep");
    assert!(json["version"].as_str().is_some_and(|v| !v.is_empty()));
}

#[test]
fn test_version_human() {
    let output = cargo_bin()
        .arg("version")
        .output()
        .expect("Failed to run version command");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("lockstep "));
}

#[test]
fn test_check_reports_divergence() {
    let tmp = TempDir::new().unwrap();
    write(
        &tmp.path().join("a"),
        "package.json",
        r#"{"name":"a","dependencies":{"has":"^1.0.3"}}"#,
    );
    write(
        &tmp.path().join("b"),
        "package.json",
        r#"{"name":"b","devDependencies":{"has":"^1.0.0"}}"#,
    );

    let (output, json) = run_json(tmp.path(), &["check", "--roots", "a|b"]);
    assert!(output.status.success());
    assert_eq!(json["ok"], true);
    assert_eq!(json["command"], "check");

    let has = json["versions"]["has"].as_object().unwrap();
    assert_eq!(has.len(), 2);
    assert_eq!(has["^1.0.3"], serde_json::json!(["a"]));
    assert_eq!(has["^1.0.0"], serde_json::json!(["b"]));
}

#[test]
fn test_check_empty_when_projects_agree() {
    let tmp = TempDir::new().unwrap();
    consistent_project(&tmp.path().join("a"), "a");
    consistent_project(&tmp.path().join("b"), "b");

    let (output, json) = run_json(tmp.path(), &["check", "--roots", "a|b"]);
    assert!(output.status.success());
    assert_eq!(json["versions"], serde_json::json!({}));
}

#[test]
fn test_frozen_sync_of_consistent_project_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("app");
    consistent_project(&root, "app");
    let before = fs::read_to_string(root.join("yarn.lock")).unwrap();

    let (output, json) = run_json(tmp.path(), &["sync", "--roots", "app", "--frozen-lockfile"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(json["ok"], true);
    assert_eq!(json["projects"], 1);
    assert_eq!(json["written"], serde_json::json!([]));
    assert_eq!(fs::read_to_string(root.join("yarn.lock")).unwrap(), before);
}

#[test]
fn test_frozen_add_fails_with_code() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("app");
    consistent_project(&root, "app");

    let (output, json) = run_json(
        tmp.path(),
        &["add", "has@^1.0.3", "--roots", "app", "--frozen-lockfile"],
    );
    assert!(!output.status.success());
    assert_eq!(json["ok"], false);
    assert_eq!(json["command"], "add");
    assert_eq!(json["error"]["code"], "PKG_FROZEN_LOCKFILE");
    assert!(!fs::read_to_string(root.join("package.json"))
        .unwrap()
        .contains("has"));
}

#[test]
fn test_invalid_manifest_reports_code() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("bad"), "package.json", "{ not json");

    let (output, json) = run_json(tmp.path(), &["sync", "--roots", "bad"]);
    assert!(!output.status.success());
    assert_eq!(json["error"]["code"], "PKG_MANIFEST_INVALID");
}

#[test]
fn test_invalid_addition_reports_code() {
    let tmp = TempDir::new().unwrap();
    consistent_project(&tmp.path().join("app"), "app");

    let (output, json) = run_json(tmp.path(), &["add", "has@", "--roots", "app"]);
    assert!(!output.status.success());
    assert_eq!(json["error"]["code"], "PKG_SPEC_INVALID");
}

#[test]
fn test_optimize_unifies_versions() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    write(
        &a,
        "package.json",
        r#"{"name":"a","dependencies":{"function-bind":"^1.1.0"}}"#,
    );
    write(
        &a,
        "yarn.lock",
        &format!("{LOCK_HEADER}\nfunction-bind@^1.1.0:\n  version \"1.1.0\"\n  resolved \"https://registry.example.test/function-bind/-/function-bind-1.1.0.tgz\"\n"),
    );
    write(
        &b,
        "package.json",
        r#"{"name":"b","dependencies":{"function-bind":"^1.1.1"}}"#,
    );
    write(
        &b,
        "yarn.lock",
        &format!("{LOCK_HEADER}\nfunction-bind@^1.1.1:\n  version \"1.1.1\"\n  resolved \"https://registry.example.test/function-bind/-/function-bind-1.1.1.tgz\"\n"),
    );

    let (output, json) = run_json(tmp.path(), &["optimize", "--roots", "a|b"]);
    assert!(output.status.success());
    assert_eq!(json["ok"], true);
    assert!(fs::read_to_string(a.join("yarn.lock"))
        .unwrap()
        .contains("version \"1.1.1\""));
}
