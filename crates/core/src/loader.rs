//! Best-effort loading of the revision, ground-truth and alert tables.
//!
//! A missing file or a malformed row never aborts a batch: it is logged, counted in the
//! returned `LoadReport`, and loading carries on with whatever could be read.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::model::{
    normalize_path, parse_line_list, AlertEntry, GroundTruthEntry, RecordKey, Revision,
    RevisionRecord,
};

/// How to read one delimited table into keyed rows.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub delimiter: u8,
    /// Columns forming the `(project, vuln_id)` key, in that order.
    pub key_columns: [usize; 2],
    /// Optional projection; `None` keeps whole rows.
    pub columns: Option<Vec<usize>>,
    /// Skip exactly the first row.
    pub title_row: bool,
}

impl TableSpec {
    /// Revisions table: comma separated, key = (project, vuln id), columns project/repo/commit/vuln.
    pub fn revisions(title_row: bool) -> Self {
        Self { delimiter: b',', key_columns: [0, 3], columns: Some(vec![0, 1, 2, 3]), title_row }
    }

    /// Ground-truth table: semicolon separated, key = (project, vuln id), columns file/lines.
    pub fn ground_truth(title_row: bool) -> Self {
        Self { delimiter: b';', key_columns: [0, 1], columns: Some(vec![2, 3]), title_row }
    }
}

/// Outcome of a best-effort load.
#[derive(Debug, Clone)]
pub struct LoadReport<V> {
    pub entries: BTreeMap<RecordKey, V>,
    /// Rows that made it into `entries`.
    pub rows: usize,
    /// Rows dropped because they could not be parsed.
    pub skipped: usize,
    /// Input files that could not be opened.
    pub missing_files: Vec<PathBuf>,
}

impl<V> Default for LoadReport<V> {
    fn default() -> Self {
        Self { entries: BTreeMap::new(), rows: 0, skipped: 0, missing_files: Vec::new() }
    }
}

pub type KeyedRows = LoadReport<Vec<Vec<String>>>;

/// Per key, findings grouped by tool name.
pub type AlertIndex = LoadReport<BTreeMap<String, Vec<AlertEntry>>>;

/// Read every record of a delimited file. `Ok(None)` when the file does not exist.
fn read_records(
    path: &Path,
    delimiter: u8,
    skipped: &mut usize,
) -> io::Result<Option<Vec<Vec<String>>>> {
    let mut reader = match csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(err) => {
            return match err.into_kind() {
                csv::ErrorKind::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => Ok(None),
                csv::ErrorKind::Io(io_err) => Err(io_err),
                other => Err(io::Error::new(io::ErrorKind::Other, format!("{other:?}"))),
            };
        }
    };

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        match record {
            Ok(record) => rows.push(record.iter().map(|f| f.to_string()).collect()),
            Err(err) => {
                warn!("{}: skipping unreadable row {}: {err}", path.display(), idx + 1);
                *skipped += 1;
            }
        }
    }
    Ok(Some(rows))
}

/// Load a table into rows grouped by composite key. Rows sharing a key are appended.
pub fn load_keyed_rows(path: &Path, spec: &TableSpec) -> KeyedRows {
    info!("Loading data from {}", path.display());
    let mut report = KeyedRows::default();
    let rows = match read_records(path, spec.delimiter, &mut report.skipped) {
        Ok(Some(rows)) => rows,
        Ok(None) => {
            warn!("Cannot locate file {}", path.display());
            report.missing_files.push(path.to_path_buf());
            return report;
        }
        Err(err) => {
            warn!("Failed to read {}: {err}", path.display());
            report.missing_files.push(path.to_path_buf());
            return report;
        }
    };

    let skip = usize::from(spec.title_row);
    for (idx, row) in rows.into_iter().enumerate().skip(skip) {
        let [project_col, id_col] = spec.key_columns;
        let (Some(project), Some(vuln_id)) = (row.get(project_col), row.get(id_col)) else {
            warn!("{}: row {} has too few columns for its key", path.display(), idx + 1);
            report.skipped += 1;
            continue;
        };
        let key = RecordKey::new(project.trim(), vuln_id.trim());

        let projected = match &spec.columns {
            None => row.clone(),
            Some(columns) => match columns.iter().map(|c| row.get(*c).cloned()).collect() {
                Some(projected) => projected,
                None => {
                    warn!("{}: row {} is missing projected columns", path.display(), idx + 1);
                    report.skipped += 1;
                    continue;
                }
            },
        };
        report.entries.entry(key).or_default().push(projected);
        report.rows += 1;
    }
    info!("Loaded {} rows from {} ({} skipped)", report.rows, path.display(), report.skipped);
    report
}

/// Load the revisions table.
pub fn load_revisions(path: &Path, title_row: bool) -> LoadReport<Vec<RevisionRecord>> {
    map_rows(load_keyed_rows(path, &TableSpec::revisions(title_row)), |row| {
        Some(RevisionRecord {
            project: row[0].trim().to_string(),
            repo: row[1].trim().to_string(),
            commit: row[2].trim().to_string(),
            vuln_id: row[3].trim().to_string(),
        })
    })
}

/// Load the ground-truth table. `clean_prefix` enables path normalization.
pub fn load_ground_truth(
    path: &Path,
    title_row: bool,
    clean_prefix: Option<&str>,
) -> LoadReport<Vec<GroundTruthEntry>> {
    map_rows(load_keyed_rows(path, &TableSpec::ground_truth(title_row)), |row| {
        let file = match clean_prefix {
            Some(prefix) => normalize_path(&row[0], prefix),
            None => row[0].clone(),
        };
        match parse_line_list(&row[1]) {
            Ok(lines) => Some(GroundTruthEntry { file, lines }),
            Err(err) => {
                warn!("Skipping ground-truth entry for {file}: {err}");
                None
            }
        }
    })
}

fn map_rows<T>(
    keyed: KeyedRows,
    mut convert: impl FnMut(&[String]) -> Option<T>,
) -> LoadReport<Vec<T>> {
    let mut report = LoadReport {
        entries: BTreeMap::new(),
        rows: 0,
        skipped: keyed.skipped,
        missing_files: keyed.missing_files,
    };
    for (key, rows) in keyed.entries {
        let converted: Vec<T> = rows
            .iter()
            .filter_map(|row| {
                let item = convert(row);
                if item.is_none() {
                    report.skipped += 1;
                }
                item
            })
            .collect();
        report.rows += converted.len();
        if !converted.is_empty() {
            report.entries.insert(key, converted);
        }
    }
    report
}

/// Walk `alerts_dir/{vuln|fix}/<project>/<tool>/<vuln_id><suffix>` and load every alert file.
///
/// Alert files carry no title row; column 2 is the file path and column 3 the recorded line(s).
pub fn load_alerts(alerts_dir: &Path, revision: Revision, clean_prefix: Option<&str>) -> AlertIndex {
    let mut report = AlertIndex::default();
    let start = alerts_dir.join(revision.as_str());
    let suffix = revision.alert_file_suffix();

    let projects = match sorted_dirs(&start) {
        Ok(dirs) => dirs,
        Err(err) => {
            warn!("Cannot read alerts folder {}: {err}", start.display());
            report.missing_files.push(start);
            return report;
        }
    };

    for project_dir in projects {
        let project = file_name(&project_dir);
        let tools = match sorted_dirs(&project_dir) {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!("Cannot read {}: {err}", project_dir.display());
                continue;
            }
        };
        for tool_dir in tools {
            let tool = file_name(&tool_dir);
            let files = match sorted_entries(&tool_dir) {
                Ok(files) => files,
                Err(err) => {
                    warn!("Cannot read {}: {err}", tool_dir.display());
                    continue;
                }
            };
            for file in files.into_iter().filter(|f| f.is_file()) {
                let name = file_name(&file);
                let Some(vuln_id) = name.strip_suffix(suffix) else {
                    continue;
                };
                let key = RecordKey::new(&project, vuln_id);
                let findings = load_alert_file(&file, &tool, clean_prefix, &mut report);
                report.entries.entry(key).or_default().entry(tool.clone()).or_default().extend(findings);
            }
        }
    }
    info!(
        "Loaded {} {} alerts for {} keys ({} skipped)",
        report.rows,
        revision,
        report.entries.len(),
        report.skipped
    );
    report
}

fn load_alert_file(
    path: &Path,
    tool: &str,
    clean_prefix: Option<&str>,
    report: &mut AlertIndex,
) -> Vec<AlertEntry> {
    let rows = match read_records(path, b';', &mut report.skipped) {
        Ok(Some(rows)) => rows,
        Ok(None) | Err(_) => {
            warn!("Cannot load alert file {}", path.display());
            report.missing_files.push(path.to_path_buf());
            return Vec::new();
        }
    };
    let mut findings = Vec::new();
    for (idx, row) in rows.into_iter().enumerate() {
        if row.len() < 4 {
            warn!("{}: row {} has fewer than 4 columns", path.display(), idx + 1);
            report.skipped += 1;
            continue;
        }
        let file = match clean_prefix {
            Some(prefix) => normalize_path(&row[2], prefix),
            None => row[2].clone(),
        };
        findings.push(AlertEntry {
            tool: tool.to_string(),
            file,
            lines: row[3].trim().to_string(),
        });
        report.rows += 1;
    }
    findings
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

fn sorted_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(sorted_entries(dir)?.into_iter().filter(|p| p.is_dir()).collect())
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}
