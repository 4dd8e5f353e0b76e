#![cfg(unix)]

use std::process::Command;
use std::time::{Duration, Instant};

use alertslice_core::process::{command_from, run_with_timeout};
use alertslice_core::services::oracle::OracleError;

#[test]
fn captures_stdout_and_stderr() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo out; echo err >&2"]);
    let output = run_with_timeout(&mut cmd, "sh", Duration::from_secs(10)).unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout.trim(), "out");
    assert_eq!(output.stderr_text(), Some("err"));
}

#[test]
fn kills_processes_past_the_deadline() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");
    let started = Instant::now();
    let err = run_with_timeout(&mut cmd, "sleep", Duration::from_millis(200)).unwrap_err();
    assert!(matches!(err, OracleError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn missing_program_is_a_spawn_error() {
    let mut cmd = Command::new("definitely-not-a-real-tool-xyz");
    let err = run_with_timeout(&mut cmd, "fake", Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, OracleError::Spawn { .. }));
}

#[test]
fn empty_command_line_is_rejected() {
    assert!(command_from(&[], "slicer").is_err());
    assert!(command_from(&["java".to_string(), "-jar".to_string()], "slicer").is_ok());
}
