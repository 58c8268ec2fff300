//! CLI tests for `harness run` and `harness init`.
//!
//! Spawns the harness binary and verifies exit codes and JSON output.

#![cfg(unix)]

use std::fs;
use std::process::{Command, Output};

use harness::exit_codes;
use harness::io::config::{HarnessConfig, load_config};
use harness::test_support::{TestWorkspace, print_lines};
use serde_json::Value;

fn harness_run(workspace: &TestWorkspace, extra: &[&str]) -> Output {
    let config = workspace.path().join("harness.toml");
    Command::new(env!("CARGO_BIN_EXE_harness"))
        .arg("run")
        .arg("--cwd")
        .arg(workspace.path())
        .arg("--config")
        .arg(&config)
        .arg("--instructions")
        .arg("say hello")
        .args(extra)
        .output()
        .expect("run harness")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("parse json stdout")
}

#[test]
fn run_prints_json_response() {
    let workspace = TestWorkspace::new().expect("workspace");
    let script = print_lines(&[">", "hello back", ">"]);
    let output = harness_run(&workspace, &["--json", "--test-command", &script]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let json = stdout_json(&output);
    assert_eq!(json["success"], Value::Bool(true));
    assert_eq!(json["output"], "hello back");
    assert!(json.get("error").is_none());
    assert_eq!(workspace.read_instructions().expect("read"), "say hello");
}

#[test]
fn run_prints_human_response() {
    let workspace = TestWorkspace::new().expect("workspace");
    let script = print_lines(&[">", "hello back", ">"]);
    let output = harness_run(&workspace, &["--test-command", &script]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "Response:\nhello back\n");
}

#[test]
fn run_without_response_exits_failed() {
    let workspace = TestWorkspace::new().expect("workspace");
    let output = harness_run(&workspace, &["--json", "--test-command", "echo '>'; exit 4"]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let json = stdout_json(&output);
    assert_eq!(json["success"], Value::Bool(false));
    assert_eq!(json["error"]["code"], 4);
}

#[test]
fn run_timeout_exits_timeout() {
    let workspace = TestWorkspace::new().expect("workspace");
    let output = harness_run(
        &workspace,
        &["--json", "--timeout-ms", "100", "--test-command", "exec sleep 30"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::TIMEOUT));
    let json = stdout_json(&output);
    assert_eq!(json["error"]["code"], "TIMEOUT");
    assert_eq!(json["error"]["message"], "Timeout after 100ms");
}

#[test]
fn run_uses_timeout_from_config() {
    let workspace = TestWorkspace::new().expect("workspace");
    fs::write(workspace.path().join("harness.toml"), "timeout_ms = 100\n").expect("write config");
    let output = harness_run(&workspace, &["--json", "--test-command", "exec sleep 30"]);

    assert_eq!(output.status.code(), Some(exit_codes::TIMEOUT));
}

#[test]
fn run_rejects_invalid_config() {
    let workspace = TestWorkspace::new().expect("workspace");
    fs::write(workspace.path().join("harness.toml"), "program = \"\"\n").expect("write config");
    let output = harness_run(&workspace, &["--test-command", "true"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("program must be non-empty"), "{stderr}");
}

#[test]
fn init_writes_default_config_once() {
    let workspace = TestWorkspace::new().expect("workspace");
    let config = workspace.path().join("harness.toml");

    let status = Command::new(env!("CARGO_BIN_EXE_harness"))
        .arg("init")
        .arg("--config")
        .arg(&config)
        .status()
        .expect("harness init");
    assert_eq!(status.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&config).expect("load"), HarnessConfig::default());

    let status = Command::new(env!("CARGO_BIN_EXE_harness"))
        .arg("init")
        .arg("--config")
        .arg(&config)
        .status()
        .expect("harness init again");
    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

const ECHO_SCRIPT: &str =
    "printf 'err-chunk\\n' 1>&2; printf 'out-chunk\\n'; sleep 0.3; printf '%s\\n' '>' 'reply' '>'";

#[test]
fn debug_echoes_each_stream_to_its_host_stream() {
    let workspace = TestWorkspace::new().expect("workspace");
    let output = harness_run(&workspace, &["--debug", "--test-command", ECHO_SCRIPT]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.starts_with("out-chunk\n"), "{stdout}");
    assert!(stdout.ends_with("Response:\nreply\n"), "{stdout}");
    assert!(!stdout.contains("err-chunk"), "{stdout}");
    assert!(stderr.contains("err-chunk\n"), "{stderr}");
    assert!(!stderr.contains("out-chunk"), "{stderr}");
}

#[test]
fn without_debug_tool_output_is_not_echoed() {
    let workspace = TestWorkspace::new().expect("workspace");
    let output = harness_run(&workspace, &["--test-command", ECHO_SCRIPT]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stdout, "Response:\nreply\n");
    assert!(!stderr.contains("err-chunk"), "{stderr}");
    assert!(!stderr.contains("out-chunk"), "{stderr}");
}
