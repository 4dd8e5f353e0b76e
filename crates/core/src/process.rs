//! Spawning external tools with a hard per-invocation timeout.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::services::oracle::OracleError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Any text on stderr is how the external tools signal failure.
    pub fn stderr_text(&self) -> Option<&str> {
        let trimmed = self.stderr.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Build a `Command` from a configured command line plus extra arguments.
pub fn command_from(parts: &[String], tool: &str) -> Result<Command, OracleError> {
    let (program, args) = parts
        .split_first()
        .ok_or_else(|| OracleError::Spawn { tool: tool.to_string(), reason: "empty command".into() })?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    Ok(cmd)
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
///
/// stdout and stderr are always piped; stdin is inherited unless the caller configured it.
pub fn run_with_timeout(
    cmd: &mut Command,
    tool: &str,
    timeout: Duration,
) -> Result<ProcessOutput, OracleError> {
    log::debug!("running {tool}: {cmd:?}");
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| OracleError::Spawn { tool: tool.to_string(), reason: e.to_string() })?;

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = wait_with_deadline(&mut child, tool, timeout)?;

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    Ok(ProcessOutput { status, stdout, stderr })
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

fn wait_with_deadline(
    child: &mut Child,
    tool: &str,
    timeout: Duration,
) -> Result<ExitStatus, OracleError> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OracleError::Timeout { tool: tool.to_string(), after: timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                return Err(OracleError::Spawn { tool: tool.to_string(), reason: e.to_string() })
            }
        }
    }
}
