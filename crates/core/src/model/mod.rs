//! Core data model for the dataset pipeline.
//!
//! Everything here is a derived, read-only artifact of a single batch run:
//! - Composite keys (`RecordKey`, `RowKey`) used to join the three input sources
//! - Revision records, ground-truth entries and alert entries as loaded from disk
//! - `DatasetRow`, the unit of every produced table
//! - Line-number helpers (`StartIndex`, line-list parsing/formatting, path normalization)

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered set of line numbers, as produced by the slicer.
pub type LineSet = BTreeSet<u32>;

/// Which side of a vulnerability fix a piece of data belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Revision {
    Vuln,
    Fix,
}

impl Revision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Revision::Vuln => "vuln",
            Revision::Fix => "fix",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "vuln" => Some(Revision::Vuln),
            "fix" => Some(Revision::Fix),
            _ => None,
        }
    }

    /// Suffix of per-tool alert files for this revision (`<vuln_id><suffix>`).
    pub fn alert_file_suffix(&self) -> &'static str {
        match self {
            Revision::Vuln => "_out.csv",
            Revision::Fix => "_out_fix.csv",
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join key shared by revisions, ground truth and alerts: `(project, vulnerability id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub project: String,
    pub vuln_id: String,
}

impl RecordKey {
    pub fn new(project: impl Into<String>, vuln_id: impl Into<String>) -> Self {
        Self { project: project.into(), vuln_id: vuln_id.into() }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.project, self.vuln_id)
    }
}

/// One row of the revisions table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub project: String,
    pub repo: String,
    pub commit: String,
    pub vuln_id: String,
}

impl RevisionRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.project, &self.vuln_id)
    }
}

/// A manually annotated vulnerable location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthEntry {
    pub file: String,
    pub lines: Vec<u32>,
}

/// A single finding reported by a static-analysis tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub tool: String,
    pub file: String,
    /// Line value exactly as recorded by the tool, in the tool's own indexing.
    pub lines: String,
}

/// Origin of a dataset row: the ground truth diff or a named tool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSource {
    GroundTruth,
    Tool(String),
}

impl RowSource {
    pub const GROUND_TRUTH_TAG: &'static str = "ground_truth";

    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value == Self::GROUND_TRUTH_TAG {
            RowSource::GroundTruth
        } else {
            RowSource::Tool(value.to_string())
        }
    }

    pub fn is_ground_truth(&self) -> bool {
        matches!(self, RowSource::GroundTruth)
    }
}

impl fmt::Display for RowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowSource::GroundTruth => f.write_str(Self::GROUND_TRUTH_TAG),
            RowSource::Tool(name) => f.write_str(name),
        }
    }
}

/// Slices attached by the augmenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSlices {
    pub lightweight: LineSet,
    pub pessimist: LineSet,
}

/// Unit of every produced table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub project: String,
    pub repo: String,
    pub commit: String,
    pub vuln_id: String,
    /// Only present once both revisions have been reconciled into one table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Revision>,
    pub source: RowSource,
    pub file: String,
    pub lines: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slices: Option<RowSlices>,
}

impl DatasetRow {
    pub fn new(record: &RevisionRecord, source: RowSource, file: impl Into<String>, lines: Vec<u32>) -> Self {
        Self {
            project: record.project.clone(),
            repo: record.repo.clone(),
            commit: record.commit.clone(),
            vuln_id: record.vuln_id.clone(),
            revision: None,
            source,
            file: file.into(),
            lines,
            slices: None,
        }
    }

    pub fn row_key(&self) -> RowKey {
        RowKey {
            project: self.project.clone(),
            vuln_id: self.vuln_id.clone(),
            source: self.source.clone(),
            file: self.file.clone(),
        }
    }
}

/// Join key used when reconciling the vulnerable and fixed tables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    pub project: String,
    pub vuln_id: String,
    pub source: RowSource,
    pub file: String,
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}_{}", self.project, self.vuln_id, self.source, self.file)
    }
}

/// Whether a line-number source counts from 0 or from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StartIndex {
    Zero,
    One,
}

impl StartIndex {
    /// Convert a line number in this convention to a 1-based line number.
    pub fn to_one_based(self, line: u32) -> u32 {
        match self {
            StartIndex::Zero => line + 1,
            StartIndex::One => line,
        }
    }

    /// Convert a 1-based line number back into this convention.
    pub fn from_one_based(self, line: u32) -> u32 {
        match self {
            StartIndex::Zero => line.saturating_sub(1),
            StartIndex::One => line,
        }
    }
}

impl TryFrom<u8> for StartIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StartIndex::Zero),
            1 => Ok(StartIndex::One),
            other => Err(format!("starting index must be 0 or 1, got {other}")),
        }
    }
}

impl From<StartIndex> for u8 {
    fn from(value: StartIndex) -> Self {
        match value {
            StartIndex::Zero => 0,
            StartIndex::One => 1,
        }
    }
}

/// Per-tool starting index lookup. Tools not listed (and ground truth) are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolIndexTable(pub BTreeMap<String, StartIndex>);

impl Default for ToolIndexTable {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert("Tool_A".to_string(), StartIndex::Zero);
        table.insert("Tool_B".to_string(), StartIndex::Zero);
        Self(table)
    }
}

impl ToolIndexTable {
    pub fn start_index(&self, source: &RowSource) -> StartIndex {
        match source {
            RowSource::GroundTruth => StartIndex::One,
            RowSource::Tool(name) => self.0.get(name).copied().unwrap_or(StartIndex::One),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid line number '{token}' in line list '{raw}'")]
pub struct LineListError {
    pub token: String,
    pub raw: String,
}

/// Parse a recorded line list such as `[10, 20]`, `['10', '20']`, `10 20` or `42`.
pub fn parse_line_list(raw: &str) -> Result<Vec<u32>, LineListError> {
    raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(|token| token.trim_matches(|c: char| matches!(c, '[' | ']' | '\'' | '"')))
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<u32>()
                .map_err(|_| LineListError { token: token.to_string(), raw: raw.to_string() })
        })
        .collect()
}

/// Render a line list the way every produced table stores it: `[10, 20]`.
pub fn format_line_list<'a>(lines: impl IntoIterator<Item = &'a u32>) -> String {
    let joined: Vec<String> = lines.into_iter().map(|l| l.to_string()).collect();
    format!("[{}]", joined.join(", "))
}

/// Normalize a recorded source path so that ground truth, alerts and the diff oracle agree.
///
/// Backslashes become forward slashes, leading `/` are stripped, and a bare `org/...`
/// path is re-rooted under `source_prefix`. Applying it twice changes nothing.
pub fn normalize_path(path: &str, source_prefix: &str) -> String {
    let cleaned = path.replace('\\', "/");
    let cleaned = cleaned.trim_start_matches(|c: char| c == '/' || c.is_whitespace()).trim_end();
    if cleaned.starts_with("org/") && !source_prefix.is_empty() {
        format!("{}/{}", source_prefix.trim_end_matches('/'), cleaned)
    } else {
        cleaned.to_string()
    }
}
