use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use alertslice_core::model::{Revision, RowSource};
use alertslice_core::project::{GroundTruthSource, PipelineConfig, ProjectContext, ProjectLayout};
use alertslice_core::services::assembler::assemble_revision;
use alertslice_core::services::oracle::{DiffLines, GroundTruthDiffer, OracleError};
use alertslice_core::table::{read_rows, TableKind};
use tempfile::tempdir;

/// Returns canned diffs and records every call.
#[derive(Default)]
struct FakeDiffer {
    files: DiffLines,
    failing_commits: Vec<String>,
    calls: Mutex<Vec<(String, String, Revision)>>,
}

impl GroundTruthDiffer for FakeDiffer {
    fn diff_ground_truth(
        &self,
        _repo: &str,
        commit_old: &str,
        commit_new: &str,
        revision: Revision,
    ) -> Result<DiffLines, OracleError> {
        self.calls.lock().unwrap().push((commit_old.to_string(), commit_new.to_string(), revision));
        if self.failing_commits.iter().any(|c| c == commit_new) {
            return Err(OracleError::Tool {
                tool: "line-number filter".into(),
                message: "boom".into(),
            });
        }
        Ok(self.files.clone())
    }
}

fn write(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

fn project(root: &Path, ground_truth_source: GroundTruthSource) -> ProjectContext {
    let mut config = PipelineConfig::new("AssembleTest");
    config.ground_truth_source = ground_truth_source;
    ProjectContext { layout: ProjectLayout::new(root), config }
}

fn seed_inputs(root: &Path) {
    write(
        &root.join("data/input_revisions.csv"),
        "project,repo,commit,vuln_id\n\
         P1,https://github.com/acme/p1,c1,V1\n",
    );
    write(
        &root.join("data/ground_truth.csv"),
        "project;vuln;file;lines\n\
         P1;V1;src/A.java;[10]\n\
         P1;V1;src/B.java;[20]\n",
    );
    write(&root.join("data/tool_alerts/vuln/P1/Tool_A/V1_out.csv"), "r;m;src/A.java;[9]\n");
}

#[test]
fn table_ground_truth_and_one_alert_produce_three_rows() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    let ctx = project(dir.path(), GroundTruthSource::Table);
    let differ = FakeDiffer::default();

    let stats = assemble_revision(&ctx, &differ, Revision::Vuln).unwrap();
    assert_eq!(stats.ground_truth_rows, 2);
    assert_eq!(stats.tool_rows, 1);
    assert!(differ.calls.lock().unwrap().is_empty());

    let output = ctx.layout.revision_table("dataset_no_slice", Revision::Vuln);
    let rows = read_rows(&output, TableKind::Revision).unwrap().rows;
    assert_eq!(rows.len(), 3);
    let gt: Vec<_> = rows.iter().filter(|r| r.source.is_ground_truth()).collect();
    assert_eq!(gt.len(), 2);
    let tool = rows.iter().find(|r| r.source == RowSource::Tool("Tool_A".into())).unwrap();
    assert_eq!(tool.file, "src/A.java");
    assert_eq!(tool.lines, vec![9]);
    assert_eq!(tool.commit, "c1");

    let header = fs::read_to_string(&output).unwrap();
    assert!(header.starts_with("project;repo;commit;vuln_id;tool;file;lines"));
}

#[test]
fn two_ground_truth_lines_and_two_tool_findings_share_the_key() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("data/input_revisions.csv"),
        "project,repo,commit,vuln_id\n\
         P1,https://github.com/acme/p1,c,V1\n",
    );
    write(
        &root.join("data/ground_truth.csv"),
        "project;vuln;file;lines\n\
         P1;V1;src/F.java;[10]\n\
         P1;V1;src/F.java;[20]\n",
    );
    write(
        &root.join("data/tool_alerts/vuln/P1/Tool_A/V1_out.csv"),
        "r;m;src/F.java;[10]\n\
         r;m;src/F.java;[15]\n",
    );
    let ctx = project(root, GroundTruthSource::Table);

    let stats = assemble_revision(&ctx, &FakeDiffer::default(), Revision::Vuln).unwrap();
    assert_eq!(stats.ground_truth_rows, 2);
    assert_eq!(stats.tool_rows, 2);
    assert_eq!(stats.skipped_findings, 0);

    let rows = read_rows(&ctx.layout.revision_table("dataset_no_slice", Revision::Vuln), TableKind::Revision)
        .unwrap()
        .rows;
    assert_eq!(rows.len(), 4);
    for row in &rows {
        assert_eq!(
            (row.project.as_str(), row.repo.as_str(), row.commit.as_str(), row.vuln_id.as_str()),
            ("P1", "https://github.com/acme/p1", "c", "V1")
        );
        assert_eq!(row.file, "src/F.java");
    }
    let gt: Vec<_> = rows.iter().filter(|r| r.source.is_ground_truth()).map(|r| r.lines.clone()).collect();
    assert_eq!(gt, vec![vec![10], vec![20]]);
    // Tool lines stay in the tool's own zero-based indexing until slicing.
    let tool: Vec<_> = rows
        .iter()
        .filter(|r| r.source == RowSource::Tool("Tool_A".into()))
        .map(|r| r.lines.clone())
        .collect();
    assert_eq!(tool, vec![vec![10], vec![15]]);
}

#[test]
fn diff_ground_truth_emits_one_row_per_changed_file() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    let ctx = project(dir.path(), GroundTruthSource::Diff);
    let mut files = BTreeMap::new();
    files.insert("src/A.java".to_string(), vec![10, 11]);
    files.insert("src/B.java".to_string(), vec![20]);
    let differ = FakeDiffer { files, ..Default::default() };

    let stats = assemble_revision(&ctx, &differ, Revision::Fix).unwrap();
    assert_eq!(stats.ground_truth_rows, 2);
    // Fix alerts were never seeded.
    assert_eq!(stats.tool_rows, 0);
    assert_eq!(stats.alert_misses, 1);

    let calls = differ.calls.lock().unwrap();
    assert_eq!(calls.as_slice(), &[("c1^".to_string(), "c1".to_string(), Revision::Fix)]);

    let rows = read_rows(&ctx.layout.revision_table("dataset_no_slice", Revision::Fix), TableKind::Revision)
        .unwrap()
        .rows;
    assert_eq!(rows[0].file, "src/A.java");
    assert_eq!(rows[0].lines, vec![10, 11]);
}

#[test]
fn failing_diff_skips_the_key_but_not_the_batch() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("data/input_revisions.csv"),
        "project,repo,commit,vuln_id\n\
         P1,https://github.com/acme/p1,bad,V1\n\
         P1,https://github.com/acme/p1,good,V2\n",
    );
    write(&root.join("data/tool_alerts/vuln/P1/Tool_A/V1_out.csv"), "r;m;src/A.java;[9]\n");
    write(&root.join("data/tool_alerts/vuln/P1/Tool_A/V2_out.csv"), "r;m;src/A.java;[5]\n");
    let ctx = project(root, GroundTruthSource::Diff);
    let mut files = BTreeMap::new();
    files.insert("src/A.java".to_string(), vec![1]);
    let differ = FakeDiffer { files, failing_commits: vec!["bad".into()], ..Default::default() };

    let stats = assemble_revision(&ctx, &differ, Revision::Vuln).unwrap();
    assert_eq!(stats.keys, 2);
    assert_eq!(stats.skipped_keys, 1);
    assert_eq!(stats.rows_written(), 2);
    // Ground truth table is absent: every key is a miss, which is only a warning.
    assert_eq!(stats.ground_truth_misses, 2);

    let rows = read_rows(&ctx.layout.revision_table("dataset_no_slice", Revision::Vuln), TableKind::Revision)
        .unwrap()
        .rows;
    assert!(rows.iter().all(|r| r.vuln_id == "V2"));
}

#[test]
fn unparsable_alert_lines_are_dropped_per_finding() {
    let dir = tempdir().unwrap();
    seed_inputs(dir.path());
    write(
        &dir.path().join("data/tool_alerts/vuln/P1/Tool_B/V1_out.csv"),
        "r;m;src/A.java;line ten\nr;m;src/A.java;[3]\n",
    );
    let ctx = project(dir.path(), GroundTruthSource::Table);
    let stats = assemble_revision(&ctx, &FakeDiffer::default(), Revision::Vuln).unwrap();
    assert_eq!(stats.skipped_findings, 1);
    assert_eq!(stats.tool_rows, 2);
}

#[test]
fn missing_inputs_still_write_a_header_only_table() {
    let dir = tempdir().unwrap();
    let ctx = project(dir.path(), GroundTruthSource::Diff);
    let stats = assemble_revision(&ctx, &FakeDiffer::default(), Revision::Vuln).unwrap();
    assert_eq!(stats.rows_written(), 0);
    let output = ctx.layout.revision_table("dataset_no_slice", Revision::Vuln);
    assert_eq!(read_rows(&output, TableKind::Revision).unwrap().rows.len(), 0);
}
