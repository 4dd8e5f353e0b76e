//! Attaches lightweight and pessimist slices to every reconciled row.
//!
//! Rows are sliced on a fixed pool of worker threads fed through a bounded queue; the
//! submitting side blocks while the queue is full. All results flow back to the calling
//! thread, which is the only writer of the output table.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;

use crate::model::{DatasetRow, LineSet, RowSlices, ToolIndexTable};
use crate::project::ProjectContext;
use crate::services::oracle::{OracleError, SliceOracle, SliceStrategy, SourceRef};
use crate::table::{read_rows, TableKind, TableWriter};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AugmentStats {
    pub rows: usize,
    pub augmented: usize,
    /// Rows left out of the output because a fetch or a slicer call failed.
    pub failed: usize,
    pub unreadable: usize,
}

pub struct Augmenter<'a> {
    pub oracle: &'a dyn SliceOracle,
    pub tool_index: &'a ToolIndexTable,
    pub workers: usize,
    pub queue_depth: usize,
}

type RowOutcome = Result<DatasetRow, (String, OracleError)>;

impl<'a> Augmenter<'a> {
    /// Slice one row with both strategies at the row's commit.
    pub fn slice_row(&self, row: &DatasetRow) -> Result<DatasetRow, OracleError> {
        let target = SourceRef::new(&row.repo, &row.commit, &row.file);
        let start = self.tool_index.start_index(&row.source);
        let lines: LineSet = row.lines.iter().copied().collect();

        let lightweight =
            self.oracle.reduce_slice(&target, &lines, SliceStrategy::Lightweight, start)?;
        let pessimist = self.oracle.reduce_slice(&target, &lines, SliceStrategy::Pessimist, start)?;

        let mut out = row.clone();
        out.slices = Some(RowSlices { lightweight, pessimist });
        Ok(out)
    }

    /// Slice `rows` concurrently and write every successful row to `writer`.
    pub fn augment(&self, rows: Vec<DatasetRow>, writer: &mut TableWriter) -> Result<AugmentStats> {
        let mut stats = AugmentStats { rows: rows.len(), ..Default::default() };
        let total = rows.len();

        let (task_tx, task_rx) = mpsc::sync_channel::<DatasetRow>(self.queue_depth.max(1));
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, result_rx) = mpsc::channel::<RowOutcome>();

        thread::scope(|scope| -> Result<()> {
            for _ in 0..self.workers.max(1) {
                let tasks = Arc::clone(&task_rx);
                let results = result_tx.clone();
                scope.spawn(move || loop {
                    let next = match tasks.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok(row) = next else {
                        break;
                    };
                    let outcome = self.slice_row(&row).map_err(|err| (row.row_key().to_string(), err));
                    if results.send(outcome).is_err() {
                        break;
                    }
                });
            }
            drop(result_tx);
            drop(task_rx);

            scope.spawn(move || {
                for row in rows {
                    if task_tx.send(row).is_err() {
                        break;
                    }
                }
            });

            for (done, outcome) in result_rx.into_iter().enumerate() {
                match outcome {
                    Ok(row) => {
                        info!("Sliced {} ({} out of {total})", row.row_key(), done + 1);
                        writer.write_row(&row)?;
                        stats.augmented += 1;
                    }
                    Err((key, err)) => {
                        warn!("{key}: skipping row, slicing failed: {err}");
                        stats.failed += 1;
                    }
                }
            }
            Ok(())
        })?;
        Ok(stats)
    }
}

/// Read the combined table of `ctx`, slice every row and write the augmented table.
pub fn augment_table(
    ctx: &ProjectContext,
    oracle: &dyn SliceOracle,
    workers: Option<usize>,
) -> Result<AugmentStats> {
    let input = ctx.combined_path();
    let table = match read_rows(&input, TableKind::Combined) {
        Ok(table) => table,
        Err(err) => {
            warn!("{err:#}; nothing to augment");
            Default::default()
        }
    };

    let output = ctx.augmented_path();
    let mut writer = TableWriter::create(&output, TableKind::Augmented)?;
    let workers = workers.unwrap_or(ctx.config.workers);
    let augmenter = Augmenter {
        oracle,
        tool_index: &ctx.config.tool_start_index,
        workers,
        queue_depth: ctx.config.queue_depth(),
    };
    let mut stats = augmenter.augment(table.rows, &mut writer)?;
    stats.unreadable = table.skipped;
    writer.finish()?;
    info!(
        "Wrote {} rows to {} ({} failed)",
        stats.augmented,
        output.display(),
        stats.failed
    );
    Ok(stats)
}
