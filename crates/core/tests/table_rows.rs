use std::fs;

use alertslice_core::model::{DatasetRow, RevisionRecord, RowSource};
use alertslice_core::table::{read_rows, TableKind, TableWriter};
use tempfile::tempdir;

fn record(project: &str) -> RevisionRecord {
    RevisionRecord {
        project: project.into(),
        repo: "https://github.com/acme/project".into(),
        commit: "c1".into(),
        vuln_id: "V1".into(),
    }
}

#[test]
fn rows_of_a_project_named_project_are_kept() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dataset_no_slice_vuln.csv");
    let mut writer = TableWriter::create(&path, TableKind::Revision).unwrap();
    let rec = record("project");
    writer.write_row(&DatasetRow::new(&rec, RowSource::GroundTruth, "src/A.java", vec![10])).unwrap();
    writer
        .write_row(&DatasetRow::new(&rec, RowSource::Tool("Tool_A".into()), "src/A.java", vec![9]))
        .unwrap();
    assert_eq!(writer.finish().unwrap(), 2);

    let table = read_rows(&path, TableKind::Revision).unwrap();
    assert_eq!(table.skipped, 0);
    assert_eq!(table.rows.len(), 2);
    assert!(table.rows.iter().all(|row| row.project == "project"));
    assert_eq!(table.rows[1].source, RowSource::Tool("Tool_A".into()));
}

#[test]
fn headerless_table_keeps_its_first_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rows.csv");
    fs::write(
        &path,
        "project;https://github.com/acme/project;c1;V1;ground_truth;src/A.java;[10]\n\
         P2;https://github.com/acme/p2;c2;V2;Tool_B;src/B.java;[3, 4]\n",
    )
    .unwrap();

    let table = read_rows(&path, TableKind::Revision).unwrap();
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0].project, "project");
    assert_eq!(table.rows[1].lines, vec![3, 4]);
}

#[test]
fn header_of_another_table_shape_is_not_taken_as_a_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("combined.csv");
    fs::write(
        &path,
        "project;repo;commit;vuln_id;tool;file;lines\n\
         P1;https://github.com/acme/p1;c1;V1;vuln;ground_truth;src/A.java;[10]\n",
    )
    .unwrap();

    let table = read_rows(&path, TableKind::Combined).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.skipped, 1);
}
