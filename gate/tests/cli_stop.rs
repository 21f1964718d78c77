//! CLI tests for `ralph-gate stop` and `ralph-gate validate`.
//!
//! Spawns the binary in a temp workspace backed by a real git repository and
//! verifies the JSON decision on stdout and the exit code.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use ralph_gate::exit_codes;
use ralph_gate::test_support::{TestWorkspace, story, task_list};
use serde_json::{Value, json};

fn run_stop(root: &Path, stdin: &str) -> (Value, Output) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ralph-gate"))
        .current_dir(root)
        .arg("stop")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn ralph-gate stop");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait ralph-gate stop");
    let decision = serde_json::from_slice(&output.stdout).expect("decision json on stdout");
    (decision, output)
}

fn workspace(marker: Option<Value>) -> TestWorkspace {
    let ws = TestWorkspace::new().expect("workspace");
    ws.write_tasks(&task_list(vec![story("US-001")]))
        .expect("write tasks");
    if let Some(marker) = marker {
        ws.write_marker(&marker).expect("write marker");
    }
    ws.init_git().expect("init git");
    ws
}

#[test]
fn no_marker_approves() {
    let ws = workspace(None);
    let (decision, output) = run_stop(ws.root(), "{}");
    assert_eq!(decision, json!({"decision": "approve"}));
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn clean_tree_approves() {
    let ws = workspace(Some(json!({"skipReview": true})));
    let stdin = r#"{"session_id":"s-1","transcript_path":"/nonexistent"}"#;
    let (decision, output) = run_stop(ws.root(), stdin);
    assert_eq!(decision["decision"], "approve");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn uncommitted_changes_block_with_exit_zero() {
    let ws = workspace(Some(json!({"skipReview": true})));
    ws.write_file("dirty.txt", "uncommitted").expect("dirty file");
    let (decision, output) = run_stop(ws.root(), "");
    assert_eq!(decision["decision"], "block");
    let reason = decision["reason"].as_str().expect("reason");
    assert!(reason.to_lowercase().contains("uncommitted"));
    assert!(reason.contains("dirty.txt"));
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn invalid_task_list_blocks_on_malformed_stdin() {
    let ws = workspace(Some(json!({})));
    ws.write_tasks_raw("not json").expect("corrupt tasks");
    ws.commit_all("corrupt").expect("commit");
    let (decision, _) = run_stop(ws.root(), "{ not json");
    assert_eq!(
        decision,
        json!({"decision": "block", "reason": "Cannot read or parse ralph/tasks.json"})
    );
}

#[test]
fn validate_reports_ok_and_failures() {
    let ws = workspace(None);
    let output = Command::new(env!("CARGO_BIN_EXE_ralph-gate"))
        .arg("validate")
        .arg("--root")
        .arg(ws.root())
        .output()
        .expect("ralph-gate validate");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok: 1 stories");

    ws.write_tasks_value(&json!({"project": "p", "branchName": "b", "description": "d"}))
        .expect("write tasks");
    let output = Command::new(env!("CARGO_BIN_EXE_ralph-gate"))
        .arg("validate")
        .arg("--root")
        .arg(ws.root())
        .output()
        .expect("ralph-gate validate");
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("userStories"));
}
