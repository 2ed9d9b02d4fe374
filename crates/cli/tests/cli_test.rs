// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::{Path, PathBuf};
use std::process::Command;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn run_scenario(path: &Path, extra: &[&str]) -> (Option<i32>, serde_json::Value) {
    let output = Command::new(env!("CARGO_BIN_EXE_uart-mux-sim"))
        .args(["test", "--scenario", path.to_str().unwrap(), "--json"])
        .args(extra)
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .rfind(|l| l.starts_with('{'))
        .unwrap_or_else(|| panic!("no JSON result; stderr: {}", String::from_utf8_lossy(&output.stderr)));
    (output.status.code(), serde_json::from_str(line).unwrap())
}

#[test]
fn test_echo_scenario_passes() {
    let (code, result) = run_scenario(&fixture("echo-ab.yaml"), &[]);
    assert_eq!(code, Some(0), "{result}");
    assert_eq!(result["status"], "pass");
    assert_eq!(result["scenario"], "echo-ab");
    assert_eq!(result["assertions"].as_array().unwrap().len(), 4);
}

#[test]
fn test_framing_error_scenario_passes() {
    let (code, result) = run_scenario(&fixture("framing-error.yaml"), &[]);
    assert_eq!(code, Some(0), "{result}");
    assert_eq!(result["report"]["framing_errors"], 1);
}

#[test]
fn test_failed_assertion_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wrong.yaml");
    std::fs::write(
        &path,
        r#"
schema_version: "1.0"
name: wrong
input:
  text: "a"
assertions:
  - echo_equals: "b"
"#,
    )
    .unwrap();

    let (code, result) = run_scenario(&path, &[]);
    assert_eq!(code, Some(1));
    assert_eq!(result["status"], "fail");
    assert_eq!(result["assertions"][0]["passed"], false);
}

#[test]
fn test_invalid_scenario_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "schema_version: \"2.0\"\nname: bad\n").unwrap();

    let (code, result) = run_scenario(&path, &[]);
    assert_eq!(code, Some(2));
    assert_eq!(result["status"], "error");
    assert!(result["message"]
        .as_str()
        .unwrap()
        .contains("Unsupported schema_version"));
}

#[test]
fn test_scenario_without_schema_version_uses_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.yaml");
    std::fs::write(
        &path,
        r#"
name: plain
input:
  frames:
    - byte: 104
    - byte: 105
assertions:
  - echo_equals: "hi"
"#,
    )
    .unwrap();

    let (code, result) = run_scenario(&path, &[]);
    assert_eq!(code, Some(0), "{result}");
    assert_eq!(result["status"], "pass");
}

#[test]
fn test_bad_board_values_are_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    for (i, board) in [
        "baud: 0",
        "reserved_state_machines: [[3, 0]]",
        "reserved_state_machines: [[0, 9]]",
    ]
    .iter()
    .enumerate()
    {
        let path = dir.path().join(format!("board-{i}.yaml"));
        std::fs::write(&path, format!("name: board
board:
  {board}
")).unwrap();

        let (code, result) = run_scenario(&path, &[]);
        assert_eq!(code, Some(2), "{board}: {result}");
        assert_eq!(result["status"], "error");
        assert!(result["message"].as_str().unwrap().contains("Invalid 'board'"));
    }
}

#[test]
fn test_starved_scenario_hits_wall_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("starved.yaml");
    std::fs::write(
        &path,
        r#"
schema_version: "1.0"
name: starved
input:
  text: "a"
limits:
  echo_bytes: 2
  settle_ms: 10
"#,
    )
    .unwrap();

    let (code, result) = run_scenario(&path, &["--wall-time-ms", "500"]);
    assert_eq!(code, Some(3));
    assert_eq!(result["status"], "error");
}

#[test]
fn test_output_dir_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("artifacts");
    let (code, _) = run_scenario(&fixture("echo-ab.yaml"), &["--output-dir", out.to_str().unwrap()]);
    assert_eq!(code, Some(0));

    let result: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("result.json")).unwrap()).unwrap();
    assert_eq!(result["result_schema_version"], "1.0");
    assert_eq!(
        std::fs::read(out.join("console.log")).unwrap(),
        b"Starting PIO UART RX example\nAB\n"
    );
    assert!(std::fs::read_to_string(out.join("hard_uart.log"))
        .unwrap()
        .starts_with("Hello, world from PIO!"));
}
