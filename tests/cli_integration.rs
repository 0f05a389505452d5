//! Integration tests for the `tt` CLI.
//!
//! Each test works in a temp directory, runs `tt` as a subprocess, and
//! checks stdout and/or the task file it leaves behind.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use pretty_assertions::assert_eq;
use tasktree::io::store::try_load_tree;
use tasktree::model::task::Task;

fn tt_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tt"));
    cmd.args(args)
        .current_dir(dir)
        .env_remove("TASKTREE_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

/// Run `tt`, returning (stdout, stderr, success)
fn run_tt(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = tt_command(dir, args).output().expect("failed to run tt");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `tt` expecting success, return stdout.
fn run_tt_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_tt(dir, args);
    if !success {
        panic!("tt {:?} failed:\nstdout: {}\nstderr: {}", args, stdout, stderr);
    }
    stdout
}

fn saved_tree(dir: &Path) -> Task {
    try_load_tree(&dir.join("tasks.json")).unwrap()
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

#[test]
fn test_add_creates_task_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_tt_ok(tmp.path(), &["add", "Buy milk", "--due", "2025-12-31", "--priority", "2"]);
    assert_eq!(out.trim(), "0");

    let tree = saved_tree(tmp.path());
    assert_eq!(tree.name, "Main");
    assert_eq!(tree.sub_tasks.len(), 1);
    assert_eq!(tree.sub_tasks[0].name, "Buy milk");
    assert_eq!(tree.sub_tasks[0].priority, Some(2));
    assert_eq!(
        tree.sub_tasks[0].due_date.map(|d| d.to_string()).as_deref(),
        Some("2025-12-31")
    );
}

#[test]
fn test_edit_commands_in_sequence() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path();
    run_tt_ok(dir, &["add", "A"]);
    run_tt_ok(dir, &["add", "B"]);
    run_tt_ok(dir, &["add", "C"]);
    run_tt_ok(dir, &["mv", "0", "3"]);
    run_tt_ok(dir, &["done", "0"]);
    run_tt_ok(dir, &["edit", "1", "See"]);
    run_tt_ok(dir, &["priority", "2", "1"]);
    assert_eq!(saved_tree(dir).describe(), "Main {B (Completed), See, A}");

    run_tt_ok(dir, &["sort", "priority"]);
    assert_eq!(saved_tree(dir).describe(), "Main {A, B (Completed), See}");

    run_tt_ok(dir, &["undone", "1"]);
    run_tt_ok(dir, &["rm", "2"]);
    run_tt_ok(dir, &["priority", "0"]);
    let tree = saved_tree(dir);
    assert_eq!(tree.describe(), "Main {A, B}");
    assert_eq!(tree.sub_tasks[0].priority, None);
}

#[test]
fn test_nested_level() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path();
    run_tt_ok(dir, &["add", "Project"]);
    let out = run_tt_ok(dir, &["add", "Step one", "--in", "0"]);
    assert_eq!(out.trim(), "0.0");
    run_tt_ok(dir, &["add", "Detail", "--in", "0.0"]);
    run_tt_ok(dir, &["done", "0", "--in", "0"]);
    assert_eq!(
        saved_tree(dir).describe(),
        "Main {Project {Step one (Completed) {Detail}}}"
    );
}

#[test]
fn test_invalid_index_fails_and_leaves_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path();
    run_tt_ok(dir, &["add", "Only"]);
    let before = fs::read_to_string(dir.join("tasks.json")).unwrap();

    let (_, stderr, success) = run_tt(dir, &["rm", "5"]);
    assert!(!success);
    assert!(stderr.contains("invalid task index: 5"), "stderr: {}", stderr);

    let (_, stderr, success) = run_tt(dir, &["add", "x", "--in", "3"]);
    assert!(!success);
    assert!(stderr.contains("invalid task index: 3"), "stderr: {}", stderr);

    assert_eq!(fs::read_to_string(dir.join("tasks.json")).unwrap(), before);
}

#[test]
fn test_empty_name_rejected() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (_, stderr, success) = run_tt(tmp.path(), &["add", "  "]);
    assert!(!success);
    assert!(stderr.contains("must not be empty"));
    assert!(!tmp.path().join("tasks.json").exists());
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

#[test]
fn test_list_with_filters() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path();
    run_tt_ok(dir, &["add", "Pay rent", "--priority", "1"]);
    run_tt_ok(dir, &["add", "Water plants", "--priority", "5"]);
    run_tt_ok(dir, &["add", "Pay taxes"]);
    run_tt_ok(dir, &["done", "2"]);

    let out = run_tt_ok(dir, &["list"]);
    assert_eq!(out.lines().count(), 3);
    assert!(out.contains("  0  [ ] Pay rent  p1"));

    let out = run_tt_ok(dir, &["list", "--search", "pay", "--hide-completed"]);
    assert_eq!(out.trim_end(), "  0  [ ] Pay rent  p1");

    let out = run_tt_ok(dir, &["list", "--priority-above", "2"]);
    assert_eq!(out.trim_end(), "  1  [ ] Water plants  p5");
}

#[test]
fn test_list_and_show_json() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path();
    run_tt_ok(dir, &["add", "A"]);
    run_tt_ok(dir, &["add", "A1", "--in", "0"]);

    let out = run_tt_ok(dir, &["list", "--json", "--in", "0"]);
    let rows: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(rows[0]["path"], "0.0");
    assert_eq!(rows[0]["name"], "A1");

    let out = run_tt_ok(dir, &["show", "0", "--json"]);
    let task: Task = serde_json::from_str(&out).unwrap();
    assert_eq!(task.describe(), "A {A1}");

    let out = run_tt_ok(dir, &["show"]);
    assert!(out.contains("    0.0 [ ] A1"));
}

// ---------------------------------------------------------------------------
// Files, config and shell
// ---------------------------------------------------------------------------

#[test]
fn test_export_import_formats() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path();
    run_tt_ok(dir, &["add", "A, with comma"]);
    run_tt_ok(dir, &["add", "B", "--in", "0"]);
    let original = saved_tree(dir);

    for name in ["out.csv", "out.ics"] {
        run_tt_ok(dir, &["export", name]);
        let other = dir.join(format!("other-{}", name));
        run_tt_ok(dir, &["--file", other.to_str().unwrap(), "import", name]);
        assert_eq!(try_load_tree(&other).unwrap(), original);
    }

    let (_, stderr, success) = run_tt(dir, &["export", "out.txt"]);
    assert!(!success);
    assert!(stderr.contains("unknown task file format"));
}

#[test]
fn test_config_file_and_autosave_off() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(
        dir.join("tasktree.toml"),
        "[storage]\nfile = \"todo.csv\"\nautosave = false\nroot_name = \"Home\"\n",
    )
    .unwrap();

    run_tt_ok(dir, &["add", "Laundry"]);
    let tree = try_load_tree(&dir.join("todo.csv")).unwrap();
    assert_eq!(tree.describe(), "Home {Laundry}");
    assert!(!dir.join("tasks.json").exists());
}

#[test]
fn test_missing_explicit_config_is_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (_, stderr, success) = run_tt(tmp.path(), &["--config", "nope.toml", "list"]);
    assert!(!success);
    assert!(stderr.starts_with("error: could not read nope.toml"));
}

#[test]
fn test_corrupt_file_starts_fresh() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("tasks.json"), "{ broken").unwrap();
    let (out, stderr, success) = run_tt(dir, &["show"]);
    assert!(success);
    assert_eq!(out.trim_end(), "[ ] Main");
    assert!(stderr.contains("failed to load tasks"));
}

#[test]
fn test_shell_session() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path();
    let mut child = tt_command(dir, &["shell"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"add A\nadd B\nrm 0\nundo\ncd 1\nadd B1\nup\nquit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("added 1.0"));
    assert_eq!(saved_tree(dir).describe(), "Main {A, B {B1}}");
}
