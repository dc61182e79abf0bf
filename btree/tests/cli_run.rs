//! CLI tests for `btree run` and `btree config`.
//!
//! Spawns the binary in a temp directory and checks exit codes and the
//! per-frame report.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use btree::exit_codes;
use btree::io::config::{EngineConfig, load_config};
use serde_json::Value;

fn btree(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_btree"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("spawn btree")
}

#[test]
fn completed_tree_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = btree(temp.path(), &["run", "patrol"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let last = stdout.lines().last().expect("frame lines");
    assert!(last.starts_with("frame 6: SUCCESS"), "{last}");
}

#[test]
fn exhausted_budget_exits_running() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = btree(temp.path(), &["run", "selector", "--frames", "2"]);
    assert_eq!(output.status.code(), Some(exit_codes::RUNNING));
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 2);
}

#[test]
fn unknown_tree_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = btree(temp.path(), &["run", "nope"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown tree"));
}

/// Each JSON line carries the frame, the status name and the blackboard.
#[test]
fn json_report_has_one_object_per_frame() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = btree(temp.path(), &["run", "join", "--json"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let frames: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0]["frame"], 1);
    assert_eq!(frames[2]["status"], "SUCCESS");
    assert_eq!(frames[2]["board"]["scans"], 3);
}

/// A terminal `none_child_status` other than SUCCESS fails the fsm demo.
#[test]
fn config_file_changes_outcome() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("btree.toml"),
        "[state_machine]\nnone_child_status = 8\n",
    )
    .expect("write config");
    let output = btree(temp.path(), &["run", "fsm"]);
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
}

#[test]
fn invalid_config_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("btree.toml"), "[run]\nmax_frames = 0\n").expect("write config");
    let output = btree(temp.path(), &["run", "patrol"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn config_write_creates_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = btree(temp.path(), &["config", "--write", "--config", "conf/engine.toml"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let written = temp.path().join("conf/engine.toml");
    assert_eq!(load_config(&written).expect("load"), EngineConfig::default());
    assert!(String::from_utf8_lossy(&output.stdout).contains("[run]"));
}
