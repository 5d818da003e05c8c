//! E2E CLI tests for the task lifecycle and escalation runs.
//!
//! Each test runs `due` as a subprocess in an isolated temp directory and
//! drives time with the global `--now` flag.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the `due` binary, rooted in `dir`.
fn due_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("due"));
    cmd.current_dir(dir);
    // Keep the user's own config and log settings out of the test.
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd.env("HOME", dir);
    cmd.env("DUECHAIN_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd
}

fn init_project() -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    due_cmd(dir.path()).arg("init").assert().success();
    dir
}

fn json(dir: &Path, args: &[&str]) -> Value {
    let output = due_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("due should not crash");
    assert!(
        output.status.success(),
        "due {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// Create a task due 2024-01-01 created on 2023-12-01; return its id.
fn create_task(dir: &Path, extra: &[&str]) -> String {
    let mut args = vec![
        "--now",
        "2023-12-01",
        "create",
        "--name",
        "File taxes",
        "--due",
        "2024-01-01",
    ];
    args.extend_from_slice(extra);
    let task = json(dir, &args);
    task["id"].as_str().expect("id field").to_string()
}

fn full_chain() -> [&'static str; 12] {
    [
        "--level1",
        "alice",
        "--level1-days",
        "3",
        "--level2",
        "bob",
        "--level2-days",
        "2",
        "--email",
        "director@example.com",
        "--email-days",
        "2",
    ]
}

fn escalate(dir: &Path, day: &str) -> Value {
    json(dir, &["--now", day, "escalate"])
}

fn escalated_count(report: &Value) -> usize {
    report["outcomes"]
        .as_array()
        .expect("outcomes array")
        .iter()
        .filter(|o| o["result"] == "escalated")
        .count()
}

// ---------------------------------------------------------------------------
// Project setup
// ---------------------------------------------------------------------------

#[test]
fn commands_fail_before_init() {
    let dir = TempDir::new().expect("create temp dir");
    due_cmd(dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("due init"));
}

#[test]
fn init_twice_requires_force() {
    let dir = init_project();
    due_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    due_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

// ---------------------------------------------------------------------------
// Task lifecycle
// ---------------------------------------------------------------------------

#[test]
fn create_show_update_delete() {
    let dir = init_project();
    let id = create_task(dir.path(), &["--level1", "alice", "--level1-days", "3"]);
    assert!(id.starts_with("tk-"));

    let shown = json(dir.path(), &["--now", "2024-01-03", "show", &id]);
    assert_eq!(shown["name"], "File taxes");
    assert_eq!(shown["escalation_status"], "none");
    assert_eq!(shown["effective_deadline"], "2024-01-04");
    assert_eq!(shown["is_overdue"], false);

    let updated = json(
        dir.path(),
        &["update", &id, "--name", "File state taxes", "--level2", "bob", "--level2-days", "1"],
    );
    assert_eq!(updated["name"], "File state taxes");
    assert_eq!(updated["escalation"]["level2"]["assignee"], "bob");
    assert_eq!(updated["escalation"]["level1"]["assignee"], "alice");

    due_cmd(dir.path())
        .args(["delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted"));
    due_cmd(dir.path())
        .args(["show", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn half_configured_stage_is_rejected() {
    let dir = init_project();
    let output = due_cmd(dir.path())
        .args(["create", "--name", "x", "--level1", "alice", "--json"])
        .output()
        .expect("due should not crash");
    assert!(!output.status.success());
    // The JSON error object comes first; the process exit message follows it.
    let err: Value = serde_json::Deserializer::from_slice(&output.stderr)
        .into_iter::<Value>()
        .next()
        .expect("stderr should start with a JSON error")
        .expect("valid JSON");
    assert_eq!(err["error"]["error_code"], "E2004");
}

#[test]
fn update_can_drop_one_stage() {
    let dir = init_project();
    let id = create_task(dir.path(), &full_chain());

    let updated = json(dir.path(), &["update", &id, "--clear-level2"]);
    assert_eq!(updated["escalation"]["level1"]["assignee"], "alice");
    assert!(updated["escalation"]["level2"].is_null());
    assert_eq!(updated["escalation"]["email"]["recipient"], "director@example.com");
}

#[test]
fn update_without_fields_is_an_error() {
    let dir = init_project();
    let id = create_task(dir.path(), &[]);
    due_cmd(dir.path())
        .args(["update", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to update"));
}

#[test]
fn list_text_shows_deadline_and_overdue_flag() {
    let dir = init_project();
    let id = create_task(dir.path(), &["--level1", "alice", "--level1-days", "3"]);
    due_cmd(dir.path())
        .args(["--now", "2024-01-05", "list", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DEADLINE"))
        .stdout(predicate::str::contains(format!("{id}\ttodo\tnone\t2024-01-04\toverdue")));
}

// ---------------------------------------------------------------------------
// Escalation
// ---------------------------------------------------------------------------

#[test]
fn daily_runs_walk_the_chain_once() {
    let dir = init_project();
    let id = create_task(dir.path(), &full_chain());

    let mut per_day = Vec::new();
    for day in 1..=12 {
        let now = format!("2024-01-{day:02}");
        let report = escalate(dir.path(), &now);
        let again = escalate(dir.path(), &now);
        assert_eq!(escalated_count(&again), 0, "second run on {now} must be a no-op");
        per_day.push(escalated_count(&report));
    }
    assert_eq!(per_day, vec![0, 0, 0, 0, 1, 0, 1, 0, 1, 0, 0, 0]);

    let shown = json(dir.path(), &["show", &id]);
    assert_eq!(shown["escalation_status"], "email_sent");

    let notes = json(dir.path(), &["notifications"]);
    let notes = notes.as_array().expect("array");
    assert_eq!(notes.len(), 3);
    let recipients: Vec<&str> = notes.iter().filter_map(|n| n["user_id"].as_str()).collect();
    assert!(recipients.contains(&"alice"));
    assert!(recipients.contains(&"bob"));
    assert!(recipients.contains(&"director@example.com"));
}

#[test]
fn done_task_is_not_escalated() {
    let dir = init_project();
    let id = create_task(dir.path(), &full_chain());
    due_cmd(dir.path()).args(["done", &id]).assert().success();

    let report = escalate(dir.path(), "2024-03-01");
    assert_eq!(report["outcomes"].as_array().map(Vec::len), Some(0));
    assert_eq!(json(dir.path(), &["notifications"]).as_array().map(Vec::len), Some(0));
}

#[test]
fn dry_run_writes_nothing() {
    let dir = init_project();
    let id = create_task(dir.path(), &["--level1", "alice", "--level1-days", "0"]);

    let plan = json(dir.path(), &["--now", "2024-01-02", "escalate", "--dry-run"]);
    assert_eq!(plan["dry_run"], true);
    assert_eq!(plan["planned"][0]["id"], id.as_str());
    assert_eq!(plan["planned"][0]["new"], "level1");

    let shown = json(dir.path(), &["show", &id]);
    assert_eq!(shown["escalation_status"], "none");
}

#[test]
fn notifications_can_be_filtered_and_marked_read() {
    let dir = init_project();
    create_task(dir.path(), &["--level1", "alice", "--level1-days", "0"]);
    escalate(dir.path(), "2024-01-02");

    let unread = json(dir.path(), &["notifications", "--user", "alice", "--unread"]);
    let note_id = unread[0]["id"].as_str().expect("notification id").to_string();
    assert!(note_id.starts_with("nt-"));
    assert_eq!(unread[0]["link_to"], "/tasks");

    due_cmd(dir.path())
        .args(["notifications", "read", &note_id])
        .assert()
        .success();
    let after = json(dir.path(), &["notifications", "--unread"]);
    assert_eq!(after.as_array().map(Vec::len), Some(0));

    due_cmd(dir.path())
        .args(["notifications", "read", "nt-missing"])
        .assert()
        .failure();
}

#[test]
fn disabled_escalation_skips_run() {
    let dir = init_project();
    create_task(dir.path(), &["--level1", "alice", "--level1-days", "0"]);
    std::fs::write(
        dir.path().join(".duechain/config.toml"),
        "[escalation]\nenabled = false\n",
    )
    .expect("write config");

    due_cmd(dir.path())
        .args(["--now", "2024-02-01", "escalate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"));
    assert_eq!(json(dir.path(), &["notifications"]).as_array().map(Vec::len), Some(0));
}

#[test]
fn completions_do_not_need_a_project() {
    let dir = TempDir::new().expect("create temp dir");
    due_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("due"));
}
