//! CLI tests for the `guide` binary.
//!
//! Spawns the binary and checks exit codes and output for plan validation,
//! element ranking and config management.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use guide::exit_codes;
use guide::io::config::load_config;

fn guide() -> Command {
    Command::new(env!("CARGO_BIN_EXE_guide"))
}

#[test]
fn validate_usable_plan_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan = temp.path().join("plan.json");
    fs::write(
        &plan,
        "```json\n{\"steps\": [{\"action\": \"highlight\", \"targetId\": \"btn\"}, {\"action\": \"wait\"}]}\n```",
    )
    .expect("write plan");

    let output = guide()
        .arg("validate")
        .arg(&plan)
        .output()
        .expect("guide validate");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["valid"], true);
    assert_eq!(report["steps"][0]["targetId"], "btn");
    assert_eq!(report["steps"].as_array().map(Vec::len), Some(2));
}

#[test]
fn validate_rejected_plan_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan = temp.path().join("plan.json");
    fs::write(&plan, r#"{"steps": [{"action": "teleport"}]}"#).expect("write plan");

    let status = guide()
        .arg("validate")
        .arg(&plan)
        .status()
        .expect("guide validate");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn validate_reads_stdin() {
    let mut child = guide()
        .args(["validate", "-", "--max-steps", "1"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn guide");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(br#"{"steps": [{"action": "noop"}, {"action": "wait"}]}"#)
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["valid"], false);
    assert_eq!(report["steps"].as_array().map(Vec::len), Some(1));
}

#[test]
fn rank_prints_best_match_first() {
    let temp = tempfile::tempdir().expect("tempdir");
    let snapshot = temp.path().join("snapshot.json");
    fs::write(
        &snapshot,
        r#"{"elements": [
            {"id": "footer", "tag": "p", "text": "Copyright"},
            {"id": "link-billing", "tag": "a", "text": "Billing"}
        ]}"#,
    )
    .expect("write snapshot");

    let output = guide()
        .arg("rank")
        .arg("open billing")
        .arg("--snapshot")
        .arg(&snapshot)
        .output()
        .expect("guide rank");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["3.5\tlink-billing"]);
}

#[test]
fn rank_without_match_exits_no_match() {
    let temp = tempfile::tempdir().expect("tempdir");
    let snapshot = temp.path().join("snapshot.json");
    fs::write(&snapshot, r#"[{"id": "footer", "tag": "p", "text": "Copyright"}]"#)
        .expect("write snapshot");

    let status = guide()
        .arg("rank")
        .arg("open billing")
        .arg("--snapshot")
        .arg(&snapshot)
        .status()
        .expect("guide rank");

    assert_eq!(status.code(), Some(exit_codes::NO_MATCH));
}

#[test]
fn config_init_writes_defaults_and_refuses_overwrite() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = guide()
        .current_dir(temp.path())
        .args(["config", "init"])
        .status()
        .expect("guide config init");
    assert_eq!(status.code(), Some(exit_codes::OK));
    let cfg = load_config(&temp.path().join("guide.toml")).expect("load");
    assert_eq!(cfg.cycle.max_tool_loops, 2);

    let status = guide()
        .current_dir(temp.path())
        .args(["config", "init"])
        .status()
        .expect("guide config init");
    assert_eq!(status.code(), Some(exit_codes::INVALID));

    let status = guide()
        .current_dir(temp.path())
        .args(["config", "init", "--force"])
        .status()
        .expect("guide config init --force");
    assert_eq!(status.code(), Some(exit_codes::OK));
}

#[test]
fn config_show_rejects_invalid_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("guide.toml");
    fs::write(&path, "[cycle]\nmax_tool_loops = 0\n").expect("write config");

    let output = guide()
        .arg("config")
        .arg("show")
        .arg("--path")
        .arg(&path)
        .output()
        .expect("guide config show");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(!output.stderr.is_empty());
}
