//! Semicolon-delimited dataset tables.

use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::warn;

use crate::model::{format_line_list, parse_line_list, DatasetRow, Revision, RowSlices, RowSource};

/// The three table shapes produced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Per-revision table written by the assembler.
    Revision,
    /// Both revisions after reconciliation.
    Combined,
    /// Combined table with both slices attached.
    Augmented,
}

impl TableKind {
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            TableKind::Revision => &["project", "repo", "commit", "vuln_id", "tool", "file", "lines"],
            TableKind::Combined => {
                &["project", "repo", "commit", "vuln_id", "vuln_or_fix", "tool", "file", "lines"]
            }
            TableKind::Augmented => &[
                "project",
                "repo",
                "commit",
                "vuln_id",
                "vuln_or_fix",
                "tool",
                "file",
                "lines",
                "sliced_lightweight",
                "sliced_pessimist",
            ],
        }
    }

    fn has_revision(&self) -> bool {
        !matches!(self, TableKind::Revision)
    }
}

/// Render a row as the fields of a `kind` table.
pub fn row_fields(row: &DatasetRow, kind: TableKind) -> Vec<String> {
    let mut fields =
        vec![row.project.clone(), row.repo.clone(), row.commit.clone(), row.vuln_id.clone()];
    if kind.has_revision() {
        fields.push(row.revision.map(|r| r.as_str().to_string()).unwrap_or_default());
    }
    fields.push(row.source.to_string());
    fields.push(row.file.clone());
    fields.push(format_line_list(&row.lines));
    if kind == TableKind::Augmented {
        match &row.slices {
            Some(slices) => {
                fields.push(format_line_list(&slices.lightweight));
                fields.push(format_line_list(&slices.pessimist));
            }
            None => {
                fields.push(String::new());
                fields.push(String::new());
            }
        }
    }
    fields
}

/// Parse the fields of a `kind` table back into a row.
pub fn parse_row(fields: &[String], kind: TableKind) -> Result<DatasetRow> {
    let expected = kind.header().len();
    if fields.len() < expected {
        return Err(anyhow!("expected {expected} columns, found {}", fields.len()));
    }
    let mut idx = 4;
    let revision = if kind.has_revision() {
        let value = &fields[idx];
        idx += 1;
        Some(Revision::parse(value).ok_or_else(|| anyhow!("unknown revision '{value}'"))?)
    } else {
        None
    };
    let source = RowSource::parse(&fields[idx]);
    let file = fields[idx + 1].clone();
    let lines = parse_line_list(&fields[idx + 2])?;
    let slices = if kind == TableKind::Augmented {
        Some(RowSlices {
            lightweight: parse_line_list(&fields[idx + 3])?.into_iter().collect(),
            pessimist: parse_line_list(&fields[idx + 4])?.into_iter().collect(),
        })
    } else {
        None
    };
    Ok(DatasetRow {
        project: fields[0].clone(),
        repo: fields[1].clone(),
        commit: fields[2].clone(),
        vuln_id: fields[3].clone(),
        revision,
        source,
        file,
        lines,
        slices,
    })
}

/// Append-only writer for one table. The header is written on creation.
pub struct TableWriter {
    kind: TableKind,
    writer: csv::Writer<File>,
    rows: usize,
}

impl TableWriter {
    /// Create (truncate) `path`. Failing here is fatal for the stage.
    pub fn create(path: &Path, kind: TableKind) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create output table {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new().delimiter(b';').flexible(true).from_writer(file);
        writer
            .write_record(kind.header())
            .with_context(|| format!("Failed to write header to {}", path.display()))?;
        Ok(Self { kind, writer, rows: 0 })
    }

    pub fn write_row(&mut self, row: &DatasetRow) -> Result<()> {
        self.writer.write_record(row_fields(row, self.kind)).context("Failed to write row")?;
        self.rows += 1;
        Ok(())
    }

    /// Flush the buffered rows; returns the number of data rows written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().context("Failed to flush output table")?;
        Ok(self.rows)
    }
}

/// Rows read back from a table, with the count of rows that could not be parsed.
#[derive(Debug, Clone, Default)]
pub struct TableRows {
    pub rows: Vec<DatasetRow>,
    pub skipped: usize,
}

/// Read every data row of a `kind` table, skipping a leading header record.
pub fn read_rows(path: &Path, kind: TableKind) -> Result<TableRows> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open table {}", path.display()))?;
    let mut out = TableRows::default();
    for (idx, record) in reader.records().enumerate() {
        let fields: Vec<String> = match record {
            Ok(record) => record.iter().map(|f| f.to_string()).collect(),
            Err(err) => {
                warn!("{}: skipping unreadable row {}: {err}", path.display(), idx + 1);
                out.skipped += 1;
                continue;
            }
        };
        if idx == 0 && fields == kind.header() {
            continue;
        }
        match parse_row(&fields, kind) {
            Ok(row) => out.rows.push(row),
            Err(err) => {
                warn!("{}: skipping row {}: {err}", path.display(), idx + 1);
                out.skipped += 1;
            }
        }
    }
    Ok(out)
}
