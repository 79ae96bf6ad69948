//! Integration tests for the `pw` CLI.
//!
//! Each test seeds a temp directory with a data file, runs `pw` as a
//! subprocess, and checks stdout and/or the data file afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use pretty_assertions::assert_eq;
use serde_json::Value;

/// Get the path to the built `pw` binary.
fn pw_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pw");
    path
}

const SEED: &str = r#"{
  "items": [
    { "id": "T-1", "kind": "task", "title": "Plan launch", "tier": "high", "sort_order": 0 },
    { "id": "T-2", "kind": "task", "title": "Reply to the venue", "tier": "high", "sort_order": 1 },
    { "id": "T-3", "kind": "task", "title": "Clean desk", "tier": "low", "sort_order": 0 },
    { "id": "T-1.1", "parent_id": "T-1", "kind": "task", "title": "Draft outline", "sort_order": 0 },
    { "id": "T-1.2", "parent_id": "T-1", "kind": "task", "title": "Book room", "sort_order": 1 },
    { "id": "L-1", "kind": "list", "title": "Groceries", "sort_order": 0 }
  ],
  "blocks": [
    {
      "id": "b-1",
      "item_id": "T-2",
      "timeframe": "daily",
      "section": "today",
      "date": "2025-03-10",
      "scheduled_start_time": "09:00:00",
      "duration_minutes": 30
    }
  ]
}"#;

fn seed(root: &Path, doc: &str) {
    fs::write(root.join("planwell.json"), doc).unwrap();
}

/// Run `pw` in `dir`, returning (stdout, stderr, success).
fn run_pw(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(pw_bin())
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run pw");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `pw` expecting success, return stdout.
fn run_pw_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_pw(dir, args);
    if !success {
        panic!("pw {:?} failed:\nstdout: {}\nstderr: {}", args, stdout, stderr);
    }
    stdout
}

fn read_doc(dir: &Path) -> Value {
    let text = fs::read_to_string(dir.join("planwell.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn item<'a>(doc: &'a Value, id: &str) -> Option<&'a Value> {
    doc["items"].as_array().unwrap().iter().find(|i| i["id"] == id)
}

fn sort_order(doc: &Value, id: &str) -> u64 {
    item(doc, id).unwrap()["sort_order"].as_u64().unwrap()
}

fn setup() -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().unwrap();
    seed(tmp.path(), SEED);
    tmp
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[test]
fn test_show_groups_by_tier() {
    let tmp = setup();
    let out = run_pw_ok(tmp.path(), &["show"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            "0   == High ==",
            "1   [ ] T-1  Plan launch \u{25b8}",
            "2   [ ] T-2  Reply to the venue",
            "3   == Low ==",
            "4   [ ] T-3  Clean desk",
        ]
    );
}

#[test]
fn test_show_expanded_and_lists() {
    let tmp = setup();
    let out = run_pw_ok(tmp.path(), &["show", "-e", "T-1"]);
    assert!(out.contains("    [ ] T-1.1  Draft outline"));
    assert!(out.contains("+ add to T-1"));

    let out = run_pw_ok(tmp.path(), &["show", "--kind", "list"]);
    assert_eq!(out.trim(), "0   [ ] L-1  Groceries");
}

#[test]
fn test_show_json() {
    let tmp = setup();
    let out = run_pw_ok(tmp.path(), &["show", "--json"]);
    let rows: Value = serde_json::from_str(&out).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["row"], "header");
    assert_eq!(rows[1]["id"], "T-1");
    assert_eq!(rows[1]["title"], "Plan launch");
    assert_eq!(rows[1]["has_children"], true);
}

#[test]
fn test_missing_data_file_is_empty() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_pw_ok(tmp.path(), &["show"]);
    assert_eq!(out, "");
}

// ---------------------------------------------------------------------------
// Adding and moving
// ---------------------------------------------------------------------------

#[test]
fn test_add_appends_to_group() {
    let tmp = setup();
    let id = run_pw_ok(tmp.path(), &["add", "Water plants", "--tier", "low"]);
    assert_eq!(id.trim(), "T-4");
    let child = run_pw_ok(tmp.path(), &["add", "Print badges", "--parent", "T-1"]);
    assert_eq!(child.trim(), "T-1.3");

    let doc = read_doc(tmp.path());
    assert_eq!(sort_order(&doc, "T-4"), 1);
    assert_eq!(sort_order(&doc, "T-1.3"), 2);
    assert_eq!(item(&doc, "T-1.3").unwrap()["parent_id"], "T-1");
}

#[test]
fn test_add_rejects_grandchild() {
    let tmp = setup();
    let (_, stderr, success) = run_pw(tmp.path(), &["add", "Too deep", "--parent", "T-1.1"]);
    assert!(!success);
    assert!(stderr.contains("cannot have children"));
}

#[test]
fn test_mv_down_lands_after_target() {
    let tmp = setup();
    let out = run_pw_ok(tmp.path(), &["mv", "T-1", "T-2"]);
    assert_eq!(out.lines().collect::<Vec<_>>(), vec!["T-2 = 0", "T-1 = 1"]);

    let doc = read_doc(tmp.path());
    assert_eq!(sort_order(&doc, "T-2"), 0);
    assert_eq!(sort_order(&doc, "T-1"), 1);
}

#[test]
fn test_mv_across_tiers() {
    let tmp = setup();
    let out = run_pw_ok(tmp.path(), &["mv", "T-3", "--at", "1"]);
    assert!(out.starts_with("T-3: Low -> High"));

    let doc = read_doc(tmp.path());
    assert_eq!(item(&doc, "T-3").unwrap()["tier"], "high");
    assert_eq!(sort_order(&doc, "T-3"), 0);
    assert_eq!(sort_order(&doc, "T-1"), 1);
    assert_eq!(sort_order(&doc, "T-2"), 2);
}

#[test]
fn test_mv_to_tier() {
    let tmp = setup();
    run_pw_ok(tmp.path(), &["mv", "T-1", "--tier", "low"]);
    let doc = read_doc(tmp.path());
    assert_eq!(item(&doc, "T-1").unwrap()["tier"], "low");
    assert_eq!(sort_order(&doc, "T-1"), 1);
    assert_eq!(sort_order(&doc, "T-2"), 0);
}

#[test]
fn test_mv_child_stays_with_parent() {
    let tmp = setup();
    let (_, stderr, success) = run_pw(tmp.path(), &["mv", "T-1.1", "T-2"]);
    assert!(!success);
    assert!(stderr.contains("outside the parent"));

    let out = run_pw_ok(tmp.path(), &["mv", "T-1.2", "T-1.1"]);
    assert_eq!(out.lines().collect::<Vec<_>>(), vec!["T-1.2 = 0", "T-1.1 = 1"]);
}

#[test]
fn test_mv_same_position_is_noop() {
    let tmp = setup();
    let out = run_pw_ok(tmp.path(), &["mv", "T-1", "T-1"]);
    assert_eq!(out.trim(), "nothing to move");
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[test]
fn test_toggle_parent_cascades_and_restores() {
    let tmp = setup();
    run_pw_ok(tmp.path(), &["toggle", "T-1.2"]);

    let out = run_pw_ok(tmp.path(), &["toggle", "T-1"]);
    assert_eq!(
        out.lines().collect::<Vec<_>>(),
        vec!["T-1 completed", "also changed: T-1.1, T-1.2"]
    );
    let doc = read_doc(tmp.path());
    assert_eq!(item(&doc, "T-1.1").unwrap()["is_completed"], true);
    assert_eq!(
        item(&doc, "T-1").unwrap()["previous_child_snapshot"],
        serde_json::json!([false, true])
    );
    // T-2 closes the gap T-1 left
    assert_eq!(sort_order(&doc, "T-2"), 0);

    run_pw_ok(tmp.path(), &["toggle", "T-1"]);
    let doc = read_doc(tmp.path());
    assert_eq!(item(&doc, "T-1.1").unwrap()["is_completed"], false);
    assert_eq!(item(&doc, "T-1.2").unwrap()["is_completed"], true);
    assert!(item(&doc, "T-1").unwrap().get("previous_child_snapshot").is_none());
    // Reopened items rejoin at the end of their tier
    assert_eq!(sort_order(&doc, "T-1"), 1);
}

#[test]
fn test_last_child_completes_parent() {
    let tmp = setup();
    run_pw_ok(tmp.path(), &["toggle", "T-1.1"]);
    let out = run_pw_ok(tmp.path(), &["toggle", "T-1.2"]);
    assert!(out.contains("also changed: T-1"));
    let doc = read_doc(tmp.path());
    assert_eq!(item(&doc, "T-1").unwrap()["is_completed"], true);
}

#[test]
fn test_show_completed_section() {
    let tmp = setup();
    run_pw_ok(tmp.path(), &["toggle", "T-3"]);
    let out = run_pw_ok(tmp.path(), &["show", "--completed"]);
    assert!(!out.contains("== Low =="));
    assert!(out.contains("== Completed =="));
    assert!(out.contains("[x] T-3  Clean desk"));
}

#[test]
fn test_toggle_unknown_item() {
    let tmp = setup();
    let (_, stderr, success) = run_pw(tmp.path(), &["toggle", "NOPE"]);
    assert!(!success);
    assert!(stderr.contains("error: item not found: NOPE"));
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

#[test]
fn test_check_and_fix() {
    let tmp = tempfile::TempDir::new().unwrap();
    seed(
        tmp.path(),
        r#"{ "items": [
            { "id": "T-1", "kind": "task", "title": "a", "tier": "high", "sort_order": 0 },
            { "id": "T-2", "kind": "task", "title": "b", "tier": "high", "sort_order": 5 }
        ] }"#,
    );

    let (stdout, _, success) = run_pw(tmp.path(), &["check"]);
    assert!(!success);
    assert!(stdout.contains("task [High]: sort orders [0, 5]"));

    let out = run_pw_ok(tmp.path(), &["check", "--fix"]);
    assert!(out.contains("fixed 1 sort orders"));
    let out = run_pw_ok(tmp.path(), &["check"]);
    assert_eq!(out.trim(), "all groups in order");
    assert_eq!(sort_order(&read_doc(tmp.path()), "T-2"), 1);
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[test]
fn test_drop_creates_snapped_block() {
    let tmp = setup();
    let out = run_pw_ok(tmp.path(), &["drop", "T-3", "547", "--date", "2025-03-10"]);
    assert!(out.starts_with("09:00-09:30  2025-03-10  daily/today  T-3  Clean desk"));

    let doc = read_doc(tmp.path());
    let blocks = doc["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1]["created_from_drag"], true);
}

#[test]
fn test_drop_respects_scroll_origin() {
    let tmp = setup();
    let out = run_pw_ok(
        tmp.path(),
        &["drop", "T-3", "300", "--origin", "-120", "--date", "2025-03-10"],
    );
    assert!(out.starts_with("07:00-07:30"));
}

#[test]
fn test_block_move_and_resize() {
    let tmp = setup();
    let out = run_pw_ok(tmp.path(), &["block-move", "b-1", "60"]);
    assert!(out.starts_with("10:00-10:30"));
    let out = run_pw_ok(tmp.path(), &["block-move", "b-1", "-75"]);
    assert!(out.starts_with("08:45-09:15"));

    let out = run_pw_ok(tmp.path(), &["resize", "b-1", "bottom", "30"]);
    assert!(out.starts_with("08:45-09:45"));
    // The top edge cannot pass the minimum length
    let out = run_pw_ok(tmp.path(), &["resize", "b-1", "top", "200"]);
    assert!(out.starts_with("09:30-09:45"));
}

#[test]
fn test_unschedule_clears_or_deletes() {
    let tmp = setup();
    let out = run_pw_ok(tmp.path(), &["unschedule", "b-1"]);
    assert_eq!(out.trim(), "cleared time on block b-1");
    let doc = read_doc(tmp.path());
    assert!(doc["blocks"][0].get("scheduled_start_time").is_none());

    run_pw_ok(tmp.path(), &["drop", "T-3", "600", "--date", "2025-03-10"]);
    let doc = read_doc(tmp.path());
    let dropped = doc["blocks"][1]["id"].as_str().unwrap().to_string();
    let out = run_pw_ok(tmp.path(), &["unschedule", &dropped]);
    assert!(out.starts_with("deleted block"));
    assert_eq!(read_doc(tmp.path())["blocks"].as_array().unwrap().len(), 1);
}

#[test]
fn test_blocks_listing() {
    let tmp = setup();
    run_pw_ok(tmp.path(), &["schedule", "T-3", "--timeframe", "weekly", "--date", "2025-03-10"]);
    let out = run_pw_ok(tmp.path(), &["blocks", "--date", "2025-03-10"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("09:00-09:30"));
    assert!(lines[1].starts_with("--:-----:--  2025-03-10  weekly/today  T-3"));

    let out = run_pw_ok(tmp.path(), &["blocks", "--json"]);
    let blocks: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(blocks[0]["end_time"], "09:30");
}

#[test]
fn test_config_changes_hour_height() {
    let tmp = setup();
    fs::write(
        tmp.path().join("planwell.toml"),
        "[timeline]\nhour_height = 120.0\ndefault_duration_minutes = 45\n",
    )
    .unwrap();
    let out = run_pw_ok(tmp.path(), &["drop", "T-3", "240", "--date", "2025-03-10"]);
    assert!(out.starts_with("02:00-02:45"));
}

#[test]
fn test_invalid_config_is_an_error() {
    let tmp = setup();
    fs::write(tmp.path().join("planwell.toml"), "[timeline]\nsnap_minutes = 0\n").unwrap();
    let (_, stderr, success) = run_pw(tmp.path(), &["show"]);
    assert!(!success);
    assert!(stderr.contains("invalid config"));
}

// ---------------------------------------------------------------------------
// Deleting and notes
// ---------------------------------------------------------------------------

#[test]
fn test_rm_cascades_to_children_and_blocks() {
    let tmp = setup();
    run_pw_ok(tmp.path(), &["schedule", "T-1.1", "--date", "2025-03-10"]);
    let out = run_pw_ok(tmp.path(), &["rm", "T-1"]);
    assert_eq!(out.trim(), "deleted T-1, T-1.1, T-1.2");

    let doc = read_doc(tmp.path());
    assert!(item(&doc, "T-1.1").is_none());
    assert_eq!(doc["blocks"].as_array().unwrap().len(), 1);
    assert_eq!(sort_order(&doc, "T-2"), 0);
}

#[test]
fn test_note_set_and_clear() {
    let tmp = setup();
    run_pw_ok(tmp.path(), &["note", "T-2", "ask about parking"]);
    let doc = read_doc(tmp.path());
    assert_eq!(item(&doc, "T-2").unwrap()["note"], "ask about parking");

    run_pw_ok(tmp.path(), &["note", "T-2"]);
    let doc = read_doc(tmp.path());
    assert!(item(&doc, "T-2").unwrap().get("note").is_none());
}
