//! Aligns the vulnerable and fixed tables and keeps, per side, the lines that did not carry
//! over to the other revision.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::model::{DatasetRow, Revision, RowKey, ToolIndexTable};
use crate::project::ProjectContext;
use crate::services::oracle::{LineMapper, LineMapping, MappingRequest};
use crate::table::{read_rows, TableKind, TableRows, TableWriter};

/// Lines of `old` whose counterpart under `mapping` is not among `new`.
///
/// A line with no mapping entry has no counterpart, so it is kept.
pub fn filtered_lines(mapping: &LineMapping, old: &[u32], new: &[u32]) -> Vec<u32> {
    let new: HashSet<u32> = new.iter().copied().collect();
    old.iter()
        .copied()
        .filter(|line| match mapping.lookup(*line) {
            Some(counterpart) => !new.contains(&counterpart),
            None => true,
        })
        .collect()
}

/// Index rows by `(project, vuln_id, source, file)`.
///
/// Rows sharing a key are merged into the first one: their line lists are unioned in
/// first-seen order. Returns the index and how many rows were folded in.
pub fn index_rows(rows: Vec<DatasetRow>) -> (BTreeMap<RowKey, DatasetRow>, usize) {
    let mut index: BTreeMap<RowKey, DatasetRow> = BTreeMap::new();
    let mut merged = 0;
    for row in rows {
        match index.get_mut(&row.row_key()) {
            Some(existing) => {
                for line in row.lines {
                    if !existing.lines.contains(&line) {
                        existing.lines.push(line);
                    }
                }
                merged += 1;
            }
            None => {
                index.insert(row.row_key(), row);
            }
        }
    }
    (index, merged)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub fix_keys: usize,
    /// Fix keys with no counterpart in the vulnerable table; these are dropped.
    pub unmatched_keys: usize,
    pub ground_truth_rows: usize,
    pub mapped_rows: usize,
    /// Rows dropped because the line mapping could not be computed.
    pub mapping_errors: usize,
    pub merged_rows: usize,
}

impl ReconcileStats {
    pub fn rows_written(&self) -> usize {
        self.ground_truth_rows + self.mapped_rows
    }
}

pub struct Reconciler<'a> {
    pub mapper: &'a dyn LineMapper,
    pub tool_index: &'a ToolIndexTable,
}

impl<'a> Reconciler<'a> {
    /// Reconcile one side of a joined pair.
    ///
    /// For the fix side the mapping goes fix file (at the commit) -> vuln file (at its parent);
    /// for the vuln side, vuln file (at the parent) -> fix file (at the commit).
    pub fn reconcile_side(
        &self,
        this: &DatasetRow,
        other: &DatasetRow,
        revision: Revision,
        stats: &mut ReconcileStats,
    ) -> Option<DatasetRow> {
        let mut out = this.clone();
        out.revision = Some(revision);
        if this.source.is_ground_truth() {
            stats.ground_truth_rows += 1;
            return Some(out);
        }

        let request = MappingRequest {
            repo: this.repo.clone(),
            commit_new: this.commit.clone(),
            file_old: this.file.clone(),
            file_new: other.file.clone(),
            start: self.tool_index.start_index(&this.source),
            reversed: revision == Revision::Fix,
        };
        match self.mapper.map_lines(&request) {
            Ok(mapping) => {
                out.lines = filtered_lines(&mapping, &this.lines, &other.lines);
                stats.mapped_rows += 1;
                Some(out)
            }
            Err(err) => {
                warn!("{}: skipping {revision} row, mapping failed: {err}", this.row_key());
                stats.mapping_errors += 1;
                None
            }
        }
    }

    /// Write fix then vuln rows for every key present in both tables.
    pub fn reconcile(
        &self,
        fix: &BTreeMap<RowKey, DatasetRow>,
        vuln: &BTreeMap<RowKey, DatasetRow>,
        writer: &mut TableWriter,
    ) -> Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();
        let total = fix.len();
        for (count, (key, fix_row)) in fix.iter().enumerate() {
            stats.fix_keys += 1;
            let Some(vuln_row) = vuln.get(key) else {
                stats.unmatched_keys += 1;
                continue;
            };
            info!("Processing key {key} ({} out of {total})", count + 1);
            if let Some(row) = self.reconcile_side(fix_row, vuln_row, Revision::Fix, &mut stats) {
                writer.write_row(&row)?;
            }
            if let Some(row) = self.reconcile_side(vuln_row, fix_row, Revision::Vuln, &mut stats) {
                writer.write_row(&row)?;
            }
        }
        Ok(stats)
    }
}

fn read_or_empty(path: &Path) -> TableRows {
    match read_rows(path, TableKind::Revision) {
        Ok(rows) => rows,
        Err(err) => {
            warn!("{err:#}; continuing with an empty table");
            TableRows::default()
        }
    }
}

fn dump_index(path: &Path, index: &BTreeMap<RowKey, DatasetRow>) -> Result<()> {
    let keyed: BTreeMap<String, &DatasetRow> =
        index.iter().map(|(key, row)| (key.to_string(), row)).collect();
    let json = serde_json::to_string_pretty(&keyed).context("Failed to serialize row index")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read both revision tables of `ctx`, reconcile them and write the combined table.
pub fn reconcile_tables(ctx: &ProjectContext, mapper: &dyn LineMapper) -> Result<ReconcileStats> {
    let stem = &ctx.config.outputs.table_stem;
    let vuln_rows = read_or_empty(&ctx.layout.revision_table(stem, Revision::Vuln));
    let fix_rows = read_or_empty(&ctx.layout.revision_table(stem, Revision::Fix));
    let (vuln, vuln_merged) = index_rows(vuln_rows.rows);
    let (fix, fix_merged) = index_rows(fix_rows.rows);

    if ctx.config.outputs.dump_json {
        dump_index(&ctx.layout.revision_dump(Revision::Vuln), &vuln)?;
        dump_index(&ctx.layout.revision_dump(Revision::Fix), &fix)?;
    }

    let output = ctx.combined_path();
    let mut writer = TableWriter::create(&output, TableKind::Combined)?;
    let reconciler = Reconciler { mapper, tool_index: &ctx.config.tool_start_index };
    let mut stats = reconciler.reconcile(&fix, &vuln, &mut writer)?;
    stats.merged_rows = vuln_merged + fix_merged;
    writer.finish()?;
    info!(
        "Wrote {} rows to {} ({} mapping errors)",
        stats.rows_written(),
        output.display(),
        stats.mapping_errors
    );
    Ok(stats)
}
