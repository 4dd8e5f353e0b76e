use std::path::Path;
use std::time::Duration;

use crate::process::{command_from, run_with_timeout};
use crate::services::oracle::OracleError;

const TOOL: &str = "line differ";

/// Run the line-history differ on two local files and return 1-based `(old, new)` pairs.
pub fn run_line_differ(
    command: &[String],
    old_file: &Path,
    new_file: &Path,
    timeout: Duration,
) -> Result<Vec<(u32, u32)>, OracleError> {
    let mut cmd = command_from(command, TOOL)?;
    cmd.arg(old_file).arg(new_file);

    let output = run_with_timeout(&mut cmd, TOOL, timeout)?;
    if let Some(message) = output.stderr_text() {
        return Err(OracleError::Tool { tool: TOOL.to_string(), message: message.to_string() });
    }
    Ok(parse_line_pairs(&output.stdout))
}

/// One `old,new` pair per line; banner lines and anything unparsable are skipped.
pub fn parse_line_pairs(stdout: &str) -> Vec<(u32, u32)> {
    stdout
        .lines()
        .filter(|line| !line.contains("LHDiff"))
        .filter_map(|line| {
            let cleaned: String =
                line.chars().filter(|c| !matches!(c, '[' | ']') && !c.is_whitespace()).collect();
            let mut parts = cleaned.split(',');
            let old = parts.next()?.parse::<u32>().ok()?;
            let new = parts.next()?.parse::<u32>().ok()?;
            Some((old, new))
        })
        .collect()
}
