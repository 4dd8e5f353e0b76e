use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::ToolIndexTable;

/// Where ground-truth rows come from when assembling a revision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundTruthSource {
    /// Lines added between `commit^` and `commit`, as reported by the numbered git diff.
    #[default]
    Diff,
    /// Entries of the ground-truth table, one row per entry.
    Table,
}

/// Input tables, typically relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    pub revisions: String,
    pub ground_truth: String,
    pub alerts_dir: String,
    /// Skip the first row of the revisions and ground-truth tables.
    #[serde(default = "default_true")]
    pub title_row: bool,
    /// Normalize file paths of ground truth and alerts at load time.
    #[serde(default = "default_true")]
    pub clean_paths: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            revisions: "data/input_revisions.csv".to_string(),
            ground_truth: "data/ground_truth.csv".to_string(),
            alerts_dir: "data/tool_alerts".to_string(),
            title_row: true,
            clean_paths: true,
        }
    }
}

/// Output file names inside the layout's outputs dir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Stem of the per-revision tables (`<stem>_vuln.csv`, `<stem>_fix.csv`).
    pub table_stem: String,
    pub combined: String,
    pub augmented: String,
    /// Write keyed JSON dumps of both revision tables during reconciliation.
    #[serde(default = "default_true")]
    pub dump_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            table_stem: "dataset_no_slice".to_string(),
            combined: "combined_output.csv".to_string(),
            augmented: "alerts-dataset.csv".to_string(),
            dump_json: true,
        }
    }
}

/// Command lines of the external tools. The first element is the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub slicer: Vec<String>,
    pub line_differ: Vec<String>,
    /// Executable that annotates a unified diff with line numbers.
    pub linenum_filter: String,
    #[serde(default = "default_git")]
    pub git: String,
    /// Upper bound for every external process and HTTP read.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            slicer: vec!["java".into(), "-jar".into(), "slicer/repoman-1.0-SNAPSHOT.jar".into()],
            line_differ: vec!["java".into(), "-jar".into(), "slicer/lhdiff.jar".into()],
            linenum_filter: "slicer/showlinenum.awk".to_string(),
            git: default_git(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where source files are fetched from and which ones count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub raw_host: String,
    /// Only files with this extension are tracked in ground-truth diffs.
    pub extension: String,
    /// Root that bare `org/...` paths are re-rooted under.
    pub source_prefix: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            raw_host: "https://raw.githubusercontent.com".to_string(),
            extension: ".java".to_string(),
            source_prefix: "java".to_string(),
        }
    }
}

/// Serializable configuration of one dataset project.
///
/// This lives at `.alertslice/pipeline.json` in the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Human-friendly project name.
    pub name: String,
    /// Schema/config version.
    pub config_version: String,
    #[serde(default)]
    pub inputs: InputConfig,
    #[serde(default)]
    pub outputs: OutputConfig,
    #[serde(default)]
    pub oracles: OracleConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub tool_start_index: ToolIndexTable,
    #[serde(default)]
    pub ground_truth_source: GroundTruthSource,
    /// Augmenter worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bounded task queue depth of the augmenter; defaults to twice the workers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_depth: Option<usize>,
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_version: "0.1.0".to_string(),
            inputs: InputConfig::default(),
            outputs: OutputConfig::default(),
            oracles: OracleConfig::default(),
            source: SourceConfig::default(),
            tool_start_index: ToolIndexTable::default(),
            ground_truth_source: GroundTruthSource::default(),
            workers: default_workers(),
            queue_depth: None,
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth.unwrap_or(self.workers * 2).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow!("'workers' must be at least 1"));
        }
        if self.oracles.slicer.is_empty() {
            return Err(anyhow!("'oracles.slicer' must name a program"));
        }
        if self.oracles.line_differ.is_empty() {
            return Err(anyhow!("'oracles.line_differ' must name a program"));
        }
        if self.oracles.timeout_secs == 0 {
            return Err(anyhow!("'oracles.timeout_secs' must be positive"));
        }
        if !self.source.extension.starts_with('.') {
            return Err(anyhow!(
                "'source.extension' must start with a dot, got '{}'",
                self.source.extension
            ));
        }
        Ok(())
    }

    /// Load a config from JSON, or YAML when the extension says so.
    pub fn from_file(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config at {}", path.display()))?;
        let config: PipelineConfig =
            match path.extension().and_then(|e| e.to_str()) {
                Some("yaml") | Some("yml") => serde_yaml::from_str(&body)
                    .context("Failed to parse pipeline config YAML")?,
                _ => serde_json::from_str(&body).context("Failed to parse pipeline config JSON")?,
            };
        config.validate()?;
        Ok(config)
    }
}

fn default_true() -> bool {
    true
}

fn default_git() -> String {
    "git".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_workers() -> usize {
    3
}
