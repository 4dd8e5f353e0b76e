use std::path::Path;
use std::time::Duration;

use crate::model::LineSet;
use crate::process::{command_from, run_with_timeout};
use crate::services::oracle::{OracleError, SliceStrategy};

const TOOL: &str = "slicer";

/// Invoke `<slicer…> -f <file> -s <strategy> -l <lines…>` with 1-based lines.
pub fn run_slicer(
    command: &[String],
    file: &Path,
    strategy: SliceStrategy,
    lines: &LineSet,
    timeout: Duration,
) -> Result<LineSet, OracleError> {
    let mut cmd = command_from(command, TOOL)?;
    cmd.arg("-f").arg(file).arg("-s").arg(strategy.as_str()).arg("-l");
    cmd.args(lines.iter().map(|l| l.to_string()));

    let output = run_with_timeout(&mut cmd, TOOL, timeout)?;
    if let Some(message) = output.stderr_text() {
        return Err(OracleError::Tool { tool: TOOL.to_string(), message: message.to_string() });
    }
    parse_slicer_output(&output.stdout)
}

/// Parse `[3, 5, 8]` / `3,5,8` into a line set. An `error` marker anywhere fails the call.
pub fn parse_slicer_output(stdout: &str) -> Result<LineSet, OracleError> {
    let cleaned: String = stdout.chars().filter(|c| !matches!(c, '[' | ']') && !c.is_whitespace()).collect();
    if cleaned.to_lowercase().contains("error") {
        return Err(OracleError::Tool { tool: TOOL.to_string(), message: stdout.trim().to_string() });
    }
    cleaned
        .split(',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<u32>().map_err(|_| OracleError::Parse {
                tool: TOOL.to_string(),
                reason: format!("unexpected token '{token}'"),
            })
        })
        .collect()
}
