use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{LineSet, Revision, StartIndex};

/// Slicing strategy understood by the slicer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceStrategy {
    Lightweight,
    Pessimist,
}

impl SliceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SliceStrategy::Lightweight => "lightweight",
            SliceStrategy::Pessimist => "pessimist",
        }
    }
}

impl fmt::Display for SliceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file at a given commit of a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub repo: String,
    pub commit: String,
    pub path: String,
}

impl SourceRef {
    pub fn new(repo: impl Into<String>, commit: impl Into<String>, path: impl Into<String>) -> Self {
        Self { repo: repo.into(), commit: commit.into(), path: path.into() }
    }
}

/// Request to map line numbers of one file version onto another.
///
/// The old commit is the parent of `commit_new`; `reversed` swaps which commit is which.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingRequest {
    pub repo: String,
    pub commit_new: String,
    pub file_old: String,
    pub file_new: String,
    pub start: StartIndex,
    pub reversed: bool,
}

/// Line correspondence between two file versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineMapping {
    /// Both versions are byte-identical; every line maps onto itself.
    Equals,
    /// Old line -> new line. Lines the differ could not correlate are absent.
    Mapped(BTreeMap<u32, u32>),
}

impl LineMapping {
    /// Counterpart of `line` in the new version, if one exists.
    pub fn lookup(&self, line: u32) -> Option<u32> {
        match self {
            LineMapping::Equals => Some(line),
            LineMapping::Mapped(pairs) => pairs.get(&line).copied(),
        }
    }

    /// Build a mapping from 1-based `(old, new)` pairs, re-based into `start`.
    pub fn from_one_based_pairs(pairs: &[(u32, u32)], start: StartIndex) -> Self {
        LineMapping::Mapped(
            pairs
                .iter()
                .map(|(old, new)| (start.from_one_based(*old), start.from_one_based(*new)))
                .collect(),
        )
    }
}

/// Ground-truth lines per file, as extracted from a numbered diff.
pub type DiffLines = BTreeMap<String, Vec<u32>>;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("{url} not found")]
    NotFound { url: String },
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("Failed to spawn {tool}: {reason}")]
    Spawn { tool: String, reason: String },
    #[error("{tool} reported an error: {message}")]
    Tool { tool: String, message: String },
    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },
    #[error("Failed to parse {tool} output: {reason}")]
    Parse { tool: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OracleError {
    /// Whether the failure comes from fetching sources rather than from a tool.
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, OracleError::NotFound { .. } | OracleError::Fetch { .. })
    }
}

/// Reduces a set of candidate lines to the subset connected by program dependencies.
pub trait SliceOracle: Send + Sync {
    /// `lines` and the returned set are both expressed in the caller's `start` convention.
    fn reduce_slice(
        &self,
        target: &SourceRef,
        lines: &LineSet,
        strategy: SliceStrategy,
        start: StartIndex,
    ) -> Result<LineSet, OracleError>;
}

/// Correlates line numbers across two revisions of a file.
pub trait LineMapper {
    fn map_lines(&self, request: &MappingRequest) -> Result<LineMapping, OracleError>;
}

/// Extracts the lines changed by a vulnerability fix.
pub trait GroundTruthDiffer {
    /// For `Revision::Vuln` the diff runs new -> old, for `Revision::Fix` old -> new; either way
    /// the returned numbers are the added lines of the revision being described.
    fn diff_ground_truth(
        &self,
        repo: &str,
        commit_old: &str,
        commit_new: &str,
        revision: Revision,
    ) -> Result<DiffLines, OracleError>;
}
