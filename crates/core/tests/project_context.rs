use alertslice_core::model::{Revision, RowSource, StartIndex};
use alertslice_core::project::{
    repo_folder_name, GroundTruthSource, PipelineConfig, ProjectContext, ProjectLayout,
};

#[test]
fn project_context_loads_config_from_meta_dir() {
    let temp = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(temp.path());
    std::fs::create_dir_all(&layout.meta_dir).unwrap();

    let config = PipelineConfig::new("CtxProject");
    std::fs::write(&layout.config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let ctx = ProjectContext::from_root(temp.path()).expect("context");
    assert_eq!(ctx.config, config);
    assert_eq!(ctx.revisions_path(), temp.path().join("data/input_revisions.csv"));
    assert_eq!(ctx.combined_path(), temp.path().join("outputs/combined_output.csv"));

    ctx.ensure_dirs().unwrap();
    assert!(layout.runs_dir.is_dir());
    assert!(layout.repos_dir.is_dir());
}

#[test]
fn missing_config_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let err = ProjectContext::from_root(temp.path()).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read project config"));
}

#[test]
fn minimal_json_config_fills_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pipeline.json");
    std::fs::write(&path, r#"{"name": "Mini", "config_version": "0.1.0"}"#).unwrap();

    let config = PipelineConfig::from_file(&path).unwrap();
    assert_eq!(config.workers, 3);
    assert_eq!(config.queue_depth(), 6);
    assert_eq!(config.ground_truth_source, GroundTruthSource::Diff);
    assert_eq!(
        config.tool_start_index.start_index(&RowSource::Tool("Tool_A".into())),
        StartIndex::Zero
    );
}

#[test]
fn yaml_config_is_accepted_and_validated() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pipeline.yaml");
    std::fs::write(
        &path,
        "name: Yaml\n\
         config_version: 0.1.0\n\
         workers: 8\n\
         queue_depth: 2\n\
         ground_truth_source: table\n\
         tool_start_index:\n  Infer: 0\n\
         inputs:\n  revisions: /abs/revisions.csv\n  ground_truth: gt.csv\n  alerts_dir: alerts\n",
    )
    .unwrap();

    let ctx = ProjectContext::with_config_file(temp.path(), &path).unwrap();
    assert_eq!(ctx.config.workers, 8);
    assert_eq!(ctx.config.queue_depth(), 2);
    assert_eq!(ctx.config.ground_truth_source, GroundTruthSource::Table);
    assert!(ctx.config.inputs.title_row);
    assert_eq!(ctx.revisions_path(), std::path::PathBuf::from("/abs/revisions.csv"));
    assert_eq!(ctx.ground_truth_path(), temp.path().join("gt.csv"));

    std::fs::write(&path, "name: Bad\nconfig_version: 0.1.0\nworkers: 0\n").unwrap();
    let err = PipelineConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("workers"));
}

#[test]
fn validate_rejects_extension_without_dot() {
    let mut config = PipelineConfig::new("Ext");
    config.source.extension = "java".into();
    assert!(config.validate().is_err());
}

#[test]
fn layout_paths_are_derived_from_root() {
    let layout = ProjectLayout::new("/data/proj");
    assert_eq!(
        layout.revision_table("dataset_no_slice", Revision::Fix),
        std::path::PathBuf::from("/data/proj/outputs/dataset_no_slice_fix.csv")
    );
    assert_eq!(
        layout.run_record_path("reconcile"),
        std::path::PathBuf::from("/data/proj/.alertslice/runs/reconcile.json")
    );
    assert_eq!(
        layout.repos_dir,
        std::path::PathBuf::from("/data/proj/.alertslice/repos")
    );
    assert_eq!(repo_folder_name("https://github.com/acme/widget.git"), "widget");
    assert_eq!(repo_folder_name("git@github.com:acme/tool"), "tool");
}
