//! Joins revisions, ground truth and alerts into one per-revision row table.

use std::collections::BTreeMap;

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;

use crate::loader::{load_alerts, load_ground_truth, load_revisions, AlertIndex, LoadReport};
use crate::model::{
    parse_line_list, AlertEntry, DatasetRow, GroundTruthEntry, RecordKey, Revision,
    RevisionRecord, RowSource,
};
use crate::project::{GroundTruthSource, ProjectContext};
use crate::services::oracle::{GroundTruthDiffer, OracleError};
use crate::table::{TableKind, TableWriter};

/// Everything known about one `(project, vuln_id)` key after the join.
#[derive(Debug, Clone, Serialize)]
pub struct JoinedRecord {
    pub revision: RevisionRecord,
    /// Empty when the ground-truth table had no entry for this key.
    pub ground_truth: Vec<GroundTruthEntry>,
    /// Findings per tool; empty when no alerts exist for this key.
    pub alerts: BTreeMap<String, Vec<AlertEntry>>,
}

/// Joined records plus how lossy the join was.
#[derive(Debug, Clone, Default)]
pub struct JoinedSources {
    pub records: BTreeMap<RecordKey, JoinedRecord>,
    pub ground_truth_misses: usize,
    pub alert_misses: usize,
    /// Keys whose revisions table listed more than one record; only the first is used.
    pub duplicate_revisions: usize,
}

/// Join the three loaded sources on their composite key.
///
/// A key missing from the ground-truth or alert source gets an empty placeholder.
pub fn join_sources(
    revisions: &LoadReport<Vec<RevisionRecord>>,
    ground_truth: &LoadReport<Vec<GroundTruthEntry>>,
    alerts: &AlertIndex,
) -> JoinedSources {
    let mut joined = JoinedSources::default();
    for (key, records) in &revisions.entries {
        let Some(first) = records.first() else {
            continue;
        };
        if records.len() > 1 {
            warn!("{key}: {} revision records share this key, using the first", records.len());
            joined.duplicate_revisions += 1;
        }
        let gt = match ground_truth.entries.get(key) {
            Some(entries) => entries.clone(),
            None => {
                warn!("[SKIPPING] no ground truth for {key}");
                joined.ground_truth_misses += 1;
                Vec::new()
            }
        };
        let tool_alerts = match alerts.entries.get(key) {
            Some(by_tool) => by_tool.clone(),
            None => {
                warn!("no alerts for {key}");
                joined.alert_misses += 1;
                BTreeMap::new()
            }
        };
        joined.records.insert(
            key.clone(),
            JoinedRecord { revision: first.clone(), ground_truth: gt, alerts: tool_alerts },
        );
    }
    joined
}

/// Counters reported by one assembler run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    pub keys: usize,
    pub ground_truth_rows: usize,
    pub tool_rows: usize,
    /// Keys dropped because the ground-truth diff failed.
    pub skipped_keys: usize,
    /// Findings dropped because their line value could not be parsed.
    pub skipped_findings: usize,
    pub ground_truth_misses: usize,
    pub alert_misses: usize,
}

impl AssemblyStats {
    pub fn rows_written(&self) -> usize {
        self.ground_truth_rows + self.tool_rows
    }
}

/// Emits the rows of one revision table.
pub struct Assembler<'a> {
    pub differ: &'a dyn GroundTruthDiffer,
    pub ground_truth_source: GroundTruthSource,
}

impl<'a> Assembler<'a> {
    /// Ground-truth rows of one key: one per changed file (diff) or one per entry (table).
    pub fn ground_truth_rows(
        &self,
        record: &JoinedRecord,
        revision: Revision,
    ) -> Result<Vec<DatasetRow>, OracleError> {
        let rev = &record.revision;
        match self.ground_truth_source {
            GroundTruthSource::Diff => {
                let parent = format!("{}^", rev.commit);
                let files = self.differ.diff_ground_truth(&rev.repo, &parent, &rev.commit, revision)?;
                Ok(files
                    .into_iter()
                    .map(|(file, lines)| DatasetRow::new(rev, RowSource::GroundTruth, file, lines))
                    .collect())
            }
            GroundTruthSource::Table => Ok(record
                .ground_truth
                .iter()
                .map(|entry| {
                    DatasetRow::new(rev, RowSource::GroundTruth, &entry.file, entry.lines.clone())
                })
                .collect()),
        }
    }

    /// One row per finding, carrying the finding's recorded line value.
    pub fn tool_rows(&self, record: &JoinedRecord, stats: &mut AssemblyStats) -> Vec<DatasetRow> {
        let mut rows = Vec::new();
        for (tool, findings) in &record.alerts {
            for finding in findings {
                match parse_line_list(&finding.lines) {
                    Ok(lines) => rows.push(DatasetRow::new(
                        &record.revision,
                        RowSource::Tool(tool.clone()),
                        &finding.file,
                        lines,
                    )),
                    Err(err) => {
                        warn!("{}: skipping {tool} finding in {}: {err}", record.revision.key(), finding.file);
                        stats.skipped_findings += 1;
                    }
                }
            }
        }
        rows
    }

    /// Write the table for `revision`, key by key.
    pub fn assemble(
        &self,
        joined: &JoinedSources,
        revision: Revision,
        writer: &mut TableWriter,
    ) -> Result<AssemblyStats> {
        let mut stats = AssemblyStats {
            ground_truth_misses: joined.ground_truth_misses,
            alert_misses: joined.alert_misses,
            ..Default::default()
        };
        let total = joined.records.len();
        for (count, (key, record)) in joined.records.iter().enumerate() {
            info!("Processing key {key} ({} out of {total} - {revision})", count + 1);
            stats.keys += 1;
            let gt_rows = match self.ground_truth_rows(record, revision) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!("{key}: skipping key, ground truth unavailable: {err}");
                    stats.skipped_keys += 1;
                    continue;
                }
            };
            for row in &gt_rows {
                writer.write_row(row)?;
            }
            stats.ground_truth_rows += gt_rows.len();

            let tool_rows = self.tool_rows(record, &mut stats);
            for row in &tool_rows {
                writer.write_row(row)?;
            }
            stats.tool_rows += tool_rows.len();
        }
        Ok(stats)
    }
}

/// Load all three sources for `revision` as configured in `ctx`.
pub fn load_sources(ctx: &ProjectContext, revision: Revision) -> JoinedSources {
    let inputs = &ctx.config.inputs;
    let prefix = inputs.clean_paths.then_some(ctx.config.source.source_prefix.as_str());
    let revisions = load_revisions(&ctx.revisions_path(), inputs.title_row);
    let ground_truth = load_ground_truth(&ctx.ground_truth_path(), inputs.title_row, prefix);
    let alerts = load_alerts(&ctx.alerts_dir(), revision, prefix);
    join_sources(&revisions, &ground_truth, &alerts)
}

/// Build and write `<stem>_<revision>.csv` for the project in `ctx`.
pub fn assemble_revision(
    ctx: &ProjectContext,
    differ: &dyn GroundTruthDiffer,
    revision: Revision,
) -> Result<AssemblyStats> {
    let joined = load_sources(ctx, revision);
    let output = ctx.layout.revision_table(&ctx.config.outputs.table_stem, revision);
    let mut writer = TableWriter::create(&output, TableKind::Revision)?;
    let assembler = Assembler { differ, ground_truth_source: ctx.config.ground_truth_source };
    let stats = assembler.assemble(&joined, revision, &mut writer)?;
    writer.finish()?;
    info!(
        "Wrote {} rows to {} ({} keys skipped)",
        stats.rows_written(),
        output.display(),
        stats.skipped_keys
    );
    Ok(stats)
}
