//! Stage orchestration and run records.
//!
//! Every stage leaves a JSON record under `.alertslice/runs/<stage>.json` with its
//! timestamps, the SHA-256 of each input it read and the counters it reported.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info};
use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::model::Revision;
use crate::project::ProjectContext;
use crate::services::assembler::{assemble_revision, AssemblyStats};
use crate::services::augmenter::{augment_table, AugmentStats};
use crate::services::oracle::{GroundTruthDiffer, LineMapper, SliceOracle};
use crate::services::reconciler::{reconcile_tables, ReconcileStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AssembleVuln,
    AssembleFix,
    Reconcile,
    Augment,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AssembleVuln => "assemble_vuln",
            Stage::AssembleFix => "assemble_fix",
            Stage::Reconcile => "reconcile",
            Stage::Augment => "augment",
        }
    }

    pub fn assemble(revision: Revision) -> Self {
        match revision {
            Revision::Vuln => Stage::AssembleVuln,
            Revision::Fix => Stage::AssembleFix,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub project: String,
    pub started_at: String,
    pub finished_at: String,
    pub status: RunStatus,
    /// Input path -> SHA-256 of its contents; `None` when the input did not exist.
    pub inputs: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub stats: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash of a file's contents, or `None` if it cannot be read (directories included).
pub fn sha256_file(path: &Path) -> Option<String> {
    fs::read(path).ok().map(|bytes| sha256_bytes(&bytes))
}

pub fn write_stage_record(ctx: &ProjectContext, record: &StageRecord) -> Result<PathBuf> {
    let path = ctx.layout.run_record_path(record.stage.as_str());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, serde_json::to_string_pretty(record)?)
        .with_context(|| format!("Failed to write run record at {}", path.display()))?;
    Ok(path)
}

/// Last record of `stage`, if it has ever run.
pub fn read_stage_record(ctx: &ProjectContext, stage: Stage) -> Result<Option<StageRecord>> {
    let path = ctx.layout.run_record_path(stage.as_str());
    if !path.exists() {
        return Ok(None);
    }
    let body = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read run record at {}", path.display()))?;
    let record = serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse run record at {}", path.display()))?;
    Ok(Some(record))
}

/// Run `body` as `stage`, recording the outcome whether it succeeds or not.
pub fn run_stage<T, F>(ctx: &ProjectContext, stage: Stage, inputs: &[PathBuf], body: F) -> Result<T>
where
    T: Serialize,
    F: FnOnce() -> Result<T>,
{
    let started_at = Utc::now().to_rfc3339();
    let inputs: BTreeMap<String, Option<String>> =
        inputs.iter().map(|p| (p.display().to_string(), sha256_file(p))).collect();
    info!("Starting stage {stage}");

    let outcome = body();
    let (status, stats, error) = match &outcome {
        Ok(value) => (RunStatus::Succeeded, serde_json::to_value(value)?, None),
        Err(err) => {
            error!("Stage {stage} failed: {err:#}");
            (RunStatus::Failed, serde_json::Value::Null, Some(format!("{err:#}")))
        }
    };
    let record = StageRecord {
        stage,
        project: ctx.config.name.clone(),
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        status,
        inputs,
        stats,
        error,
    };
    write_stage_record(ctx, &record)?;
    outcome
}

pub fn assemble_stage(
    ctx: &ProjectContext,
    differ: &dyn GroundTruthDiffer,
    revision: Revision,
) -> Result<AssemblyStats> {
    let inputs = vec![ctx.revisions_path(), ctx.ground_truth_path()];
    run_stage(ctx, Stage::assemble(revision), &inputs, || {
        assemble_revision(ctx, differ, revision)
    })
}

pub fn reconcile_stage(ctx: &ProjectContext, mapper: &dyn LineMapper) -> Result<ReconcileStats> {
    let stem = &ctx.config.outputs.table_stem;
    let inputs = vec![
        ctx.layout.revision_table(stem, Revision::Vuln),
        ctx.layout.revision_table(stem, Revision::Fix),
    ];
    run_stage(ctx, Stage::Reconcile, &inputs, || reconcile_tables(ctx, mapper))
}

pub fn augment_stage(
    ctx: &ProjectContext,
    oracle: &dyn SliceOracle,
    workers: Option<usize>,
) -> Result<AugmentStats> {
    let inputs = vec![ctx.combined_path()];
    run_stage(ctx, Stage::Augment, &inputs, || augment_table(ctx, oracle, workers))
}

/// Counters of a full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub vuln: AssemblyStats,
    pub fix: AssemblyStats,
    pub reconcile: ReconcileStats,
    pub augment: AugmentStats,
}

/// Assemble both revisions, reconcile them and augment the result, in that order.
pub fn run_all<O>(ctx: &ProjectContext, oracles: &O, workers: Option<usize>) -> Result<PipelineReport>
where
    O: SliceOracle + LineMapper + GroundTruthDiffer,
{
    ctx.ensure_dirs()?;
    let vuln = assemble_stage(ctx, oracles, Revision::Vuln)?;
    let fix = assemble_stage(ctx, oracles, Revision::Fix)?;
    let reconcile = reconcile_stage(ctx, oracles)?;
    let augment = augment_stage(ctx, oracles, workers)?;
    Ok(PipelineReport { vuln, fix, reconcile, augment })
}
