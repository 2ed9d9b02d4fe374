// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::io::Write;
use std::process::{Command, Stdio};

const BANNER: &str = "Starting PIO UART RX example\n";
const DEMO_TEXT: &str = "Hello, world from PIO! (Plus 2 UARTs and 2 cores, for complex reasons)\n";

fn sim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_uart-mux-sim"))
}

#[test]
fn test_run_streams_banner_and_echo() {
    let output = sim()
        .args(["run", "--input", "AB\n"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, format!("{BANNER}AB\n"));
}

#[test]
fn test_run_reads_stdin() {
    let mut child = sim()
        .args(["run"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn");
    child.stdin.take().unwrap().write_all(b"hey").unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), format!("{BANNER}hey"));
}

#[test]
fn test_run_json_report() {
    let output = sim()
        .args(["run", "--input-hex", "48 69", "--json"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .rfind(|l| l.starts_with('{'))
        .expect("JSON report not found");
    let json: serde_json::Value = serde_json::from_str(line).expect("Failed to parse JSON");
    assert_eq!(json["console"], format!("{BANNER}Hi"));
    assert_eq!(json["hard_uart"], DEMO_TEXT);
    assert_eq!(json["echoed"], 2);
    assert_eq!(json["binding"]["pio"], 0);
    assert_eq!(json["binding"]["state_machine"], 0);
    assert_eq!(json["binding"]["offset"], 23);
}

#[test]
fn test_run_show_hard_uart_goes_to_stderr() {
    let output = sim()
        .args(["run", "--input", "x", "--show-hard-uart"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Hello, world"));
    assert!(String::from_utf8_lossy(&output.stderr).contains(DEMO_TEXT));
}

#[test]
fn test_run_writes_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pio.json");
    let output = sim()
        .args(["run", "--input", "s", "--snapshot", path.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(snapshot["sm"][0]["enabled"], true);
    assert_eq!(snapshot["instruction_mem"][23], 0x2020);
}

#[test]
fn test_run_pin_out_of_range_is_runtime_error() {
    let output = sim()
        .args(["run", "--input", "x", "--pin", "30"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&output.stdout), BANNER);
}

#[test]
fn test_run_bad_hex_is_config_error() {
    let output = sim()
        .args(["run", "--input-hex", "4"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_run_unreachable_baud_is_config_error() {
    for baud in ["0", "600000000"] {
        let output = sim()
            .args(["run", "--input", "a", "--baud", baud])
            .output()
            .expect("Failed to execute command");
        assert_eq!(output.status.code(), Some(2), "baud {baud}");
        assert!(output.stdout.is_empty());
    }
}
