//! Version control inspector backed by local git clones.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::process::{run_with_timeout, ProcessOutput};
use crate::project::repo_folder_name;
use crate::services::oracle::{DiffLines, OracleError};

/// Runs git against clones kept under `repos_dir`, cloning on first use.
#[derive(Debug, Clone)]
pub struct GitInspector {
    git: String,
    repos_dir: PathBuf,
    timeout: Duration,
}

impl GitInspector {
    pub fn new(git: impl Into<String>, repos_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { git: git.into(), repos_dir: repos_dir.into(), timeout }
    }

    /// Local clone of `repo`, cloning it if the folder is missing.
    ///
    /// The clone lands in a `.partial` sibling first and is renamed into place only once git
    /// succeeds, so an interrupted clone never looks like a usable checkout.
    pub fn ensure_clone(&self, repo: &str) -> Result<PathBuf, OracleError> {
        let name = repo_folder_name(repo);
        let folder = self.repos_dir.join(&name);
        if folder.is_dir() {
            return Ok(folder);
        }
        fs::create_dir_all(&self.repos_dir)?;
        let staging = self.repos_dir.join(format!(".{name}.partial"));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        log::info!("cloning {repo} into {}", folder.display());
        let mut cmd = Command::new(&self.git);
        cmd.arg("clone").arg(repo).arg(&staging).stdin(Stdio::null());
        let cloned = self.checked(&mut cmd, "git clone").and_then(|_| {
            fs::rename(&staging, &folder)?;
            Ok(())
        });
        if let Err(err) = cloned {
            if staging.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    log::warn!("could not remove {}: {cleanup}", staging.display());
                }
            }
            return Err(err);
        }
        Ok(folder)
    }

    /// Parent of `commit` as the last hash printed by `git rev-list --parents -n 1`.
    ///
    /// Merge commits resolve to their last listed parent. A root commit only prints itself and
    /// so resolves to `commit`.
    pub fn parent_commit(&self, repo: &str, commit: &str) -> Result<String, OracleError> {
        let folder = self.ensure_clone(repo)?;
        let mut cmd = Command::new(&self.git);
        cmd.args(["rev-list", "--parents", "-n", "1", commit]).current_dir(&folder);
        let output = self.checked(&mut cmd, "git rev-list")?;
        output
            .stdout
            .split_whitespace()
            .last()
            .map(|s| s.to_string())
            .ok_or_else(|| OracleError::Parse {
                tool: "git rev-list".to_string(),
                reason: format!("no revision printed for {commit}"),
            })
    }

    /// `git diff <from> <to>` piped through the line-numbering filter.
    ///
    /// Any text the filter writes to stderr fails the whole diff.
    pub fn diff_with_line_numbers(
        &self,
        repo: &str,
        from: &str,
        to: &str,
        filter: &Path,
    ) -> Result<String, OracleError> {
        let folder = self.ensure_clone(repo)?;
        let mut git = Command::new(&self.git)
            .args(["diff", from, to])
            .current_dir(&folder)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| OracleError::Spawn { tool: "git diff".to_string(), reason: e.to_string() })?;
        let diff_stdout = git.stdout.take().ok_or_else(|| OracleError::Spawn {
            tool: "git diff".to_string(),
            reason: "stdout not captured".to_string(),
        })?;

        let mut numbering = Command::new(filter);
        numbering.stdin(Stdio::from(diff_stdout));
        let result = run_with_timeout(&mut numbering, "line-number filter", self.timeout);
        let _ = git.kill();
        let _ = git.wait();

        let output = result?;
        if let Some(message) = output.stderr_text() {
            return Err(OracleError::Tool {
                tool: "line-number filter".to_string(),
                message: message.to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn checked(&self, cmd: &mut Command, tool: &str) -> Result<ProcessOutput, OracleError> {
        let output = run_with_timeout(cmd, tool, self.timeout)?;
        if !output.status.success() {
            return Err(OracleError::Tool {
                tool: tool.to_string(),
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Extract added line numbers per tracked file from a line-numbered diff.
///
/// A `+++` header whose path ends in `extension` opens a file (path after ` b/`); any other
/// `+++` header closes it. Lines containing `:+ ` contribute the number before the first `:`.
pub fn parse_numbered_diff(diff: &str, extension: &str) -> DiffLines {
    let mut files = DiffLines::new();
    let mut current: Option<String> = None;
    for line in diff.lines() {
        if line.starts_with("+++") {
            let header = line.trim();
            current = if header.ends_with(extension) {
                let path = header.rsplit(" b/").next().unwrap_or(header).trim().to_string();
                files.entry(path.clone()).or_default();
                Some(path)
            } else {
                None
            };
            continue;
        }
        let Some(file) = current.as_ref() else {
            continue;
        };
        if !line.contains(":+ ") {
            continue;
        }
        let number = line.split(':').next().unwrap_or_default().trim();
        if let Ok(number) = number.parse::<u32>() {
            if let Some(lines) = files.get_mut(file) {
                lines.push(number);
            }
        }
    }
    files
}
