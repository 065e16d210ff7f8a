//! E2E tests for `liftoff order`, `check`, `graph` and `run` against
//! manifests written to a temp dir.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

const SERVICES: &str = r#"
[orchestrator]
phases = ["pre-configure", "configure"]

[[module]]
id = "app"
depends_on = ["db", "cache"]
observe = true

[[module]]
id = "db"
depends_on = ["disk"]

[[module]]
id = "cache"
depends_on = ["disk"]
enabled_when = "feature.cache"

[[module]]
id = "disk"
"#;

const LOOPED: &str = r#"
[[module]]
id = "1"
depends_on = ["2", "3"]

[[module]]
id = "2"
depends_on = ["4", "5"]

[[module]]
id = "3"
depends_on = ["4", "6", "1"]

[[module]]
id = "4"

[[module]]
id = "5"

[[module]]
id = "6"
"#;

fn liftoff_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("liftoff"));
    cmd.current_dir(dir);
    cmd.env("LIFTOFF_LOG", "error");
    cmd.env_remove("LIFTOFF_FORMAT");
    cmd.env_remove("LIFTOFF_PHASES");
    cmd.env_remove("LIFTOFF_SUPPRESS_DUPLICATES");
    cmd
}

fn project(manifest: &str) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("liftoff.toml"), manifest).expect("write manifest");
    dir
}

fn json_of(dir: &Path, args: &[&str]) -> Value {
    let output = liftoff_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("liftoff should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

fn names(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("string").to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// order
// ---------------------------------------------------------------------------

#[test]
fn order_is_leaf_first() {
    let dir = project(SERVICES);
    let json = json_of(dir.path(), &["order"]);
    assert_eq!(json["root"], "app");
    assert_eq!(names(&json["order"]), vec!["disk", "db", "cache", "app"]);
}

#[test]
fn order_text_is_numbered() {
    let dir = project(SERVICES);
    liftoff_cmd(dir.path())
        .args(["order", "--root", "db"])
        .assert()
        .success()
        .stdout("  1. disk\n  2. db\n");
}

#[test]
fn order_rejects_cycle_with_code() {
    let dir = project(LOOPED);
    let output = liftoff_cmd(dir.path())
        .args(["order", "--json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let body = stderr.split("\nError:").next().unwrap_or_default();
    let json: Value = serde_json::from_str(body).expect("error JSON");
    assert_eq!(json["error"]["error_code"], "E2002");
    assert!(
        json["error"]["message"]
            .as_str()
            .expect("message")
            .contains("circular dependency")
    );
}

#[test]
fn order_reports_unknown_root() {
    let dir = project(SERVICES);
    liftoff_cmd(dir.path())
        .args(["order", "--root", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown module 'ghost'"));
}

#[test]
fn missing_manifest_is_explained() {
    let dir = TempDir::new().expect("tempdir");
    liftoff_cmd(dir.path())
        .arg("order")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read manifest"))
        .stderr(predicate::str::contains("suggestion:"));
}

#[test]
fn manifest_flag_points_elsewhere() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("svc.toml"), SERVICES).expect("write");
    liftoff_cmd(dir.path())
        .args(["--manifest", "svc.toml", "order"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4. app"));
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_passes_clean_manifest() {
    let dir = project(SERVICES);
    liftoff_cmd(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: 4 modules, 4 dependencies"));
}

#[test]
fn check_fails_on_cycle() {
    let dir = project(LOOPED);
    let output = liftoff_cmd(dir.path())
        .args(["check", "--json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("report JSON");
    assert_eq!(json["ok"], false);
    let cycle = names(&json["cycle"]);
    assert_eq!(cycle.first(), cycle.last());
    assert!(cycle.contains(&"1".to_string()));
    assert!(cycle.contains(&"3".to_string()));
}

#[test]
fn check_fails_on_undeclared_dependency() {
    let dir = project("[[module]]\nid = \"app\"\ndepends_on = [\"ghost\"]\n");
    liftoff_cmd(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("'app' depends on 'ghost'"));
}

// ---------------------------------------------------------------------------
// graph
// ---------------------------------------------------------------------------

#[test]
fn graph_shows_relations() {
    let dir = project(LOOPED.replace(", \"1\"]", "]").as_str());
    let json = json_of(dir.path(), &["graph", "4"]);
    assert_eq!(names(&json["dependents"]), vec!["2", "3"]);
    assert_eq!(names(&json["ancestors"]), vec!["2", "3", "1"]);
    assert!(names(&json["depends_on"]).is_empty());

    let all = json_of(dir.path(), &["graph", "1", "--all"]);
    assert_eq!(names(&all["descendants"]), vec!["2", "3", "4", "5", "4", "6"]);
}

#[test]
fn graph_summary_lists_every_module() {
    let dir = project(SERVICES);
    let json = json_of(dir.path(), &["graph"]);
    let modules = json["modules"].as_array().expect("modules");
    assert_eq!(modules.len(), 4);
    assert_eq!(modules[0]["id"], "app");
    assert_eq!(modules[0]["depends_on"], 2);
    assert_eq!(modules[3]["dependents"], 2);
}

#[test]
fn graph_dot_output() {
    let dir = project(SERVICES);
    liftoff_cmd(dir.path())
        .args(["graph", "--dot"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph"))
        .stdout(predicate::str::contains("\"cache\""));
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_alternates_direction_and_skips_declined() {
    let dir = project(SERVICES);
    let json = json_of(dir.path(), &["run"]);
    let pass = &json["passes"][0];

    let calls: Vec<(String, String)> = pass["invocations"]
        .as_array()
        .expect("invocations")
        .iter()
        .map(|r| {
            (
                r["phase"].as_str().expect("phase").to_string(),
                r["module"].as_str().expect("module").to_string(),
            )
        })
        .collect();
    let expected: Vec<(String, String)> = [
        ("pre-configure", "app"),
        ("pre-configure", "db"),
        ("pre-configure", "disk"),
        ("configure", "disk"),
        ("configure", "db"),
        ("configure", "app"),
    ]
    .iter()
    .map(|(p, m)| ((*p).to_string(), (*m).to_string()))
    .collect();

    assert_eq!(calls, expected);
    assert_eq!(names(&pass["declined"]), vec!["cache"]);
    assert_eq!(pass["notifications"], 2);
}

#[test]
fn run_set_enables_conditional_module() {
    let dir = project(SERVICES);
    let json = json_of(dir.path(), &["run", "--set", "feature.cache=true", "--phases", "configure"]);
    let pass = &json["passes"][0];
    assert_eq!(pass["invocations"].as_array().expect("invocations").len(), 4);
    assert!(names(&pass["declined"]).is_empty());
    assert_eq!(json["properties"]["feature.cache"], true);
}

#[test]
fn run_repeat_is_suppressed_unless_disabled() {
    let dir = project(SERVICES);

    let json = json_of(dir.path(), &["run", "--repeat", "2"]);
    assert_eq!(json["passes"][1]["invocations"].as_array().expect("arr").len(), 0);
    assert_eq!(json["passes"][1]["suppressed"].as_array().expect("arr").len(), 6);

    let json = json_of(dir.path(), &["run", "--repeat", "2", "--no-suppress"]);
    assert_eq!(json["passes"][1]["invocations"].as_array().expect("arr").len(), 6);
}

#[test]
fn run_phases_from_env() {
    let dir = project(SERVICES);
    let output = liftoff_cmd(dir.path())
        .env("LIFTOFF_PHASES", "initialize")
        .args(["run", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("JSON");
    assert_eq!(names(&json["phases"]), vec!["initialize"]);
}

#[test]
fn run_rejects_unknown_phase() {
    let dir = project(SERVICES);
    liftoff_cmd(dir.path())
        .args(["run", "--phases", "warmup"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid argument"));
}

#[test]
fn run_refuses_cycle_before_any_hook() {
    let dir = project(LOOPED);
    liftoff_cmd(dir.path())
        .env("LIFTOFF_LOG", "info")
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("circular dependency"))
        .stderr(predicate::str::contains("hook").not());
}
