use std::fs;

use alertslice_core::project::{load_project_config, PipelineConfig, ProjectLayout};
use alertslice_core::services::pipeline::{read_stage_record, Stage, StageRecord};
use anyhow::{Context, Result};
use serde::Serialize;

use crate::commands::print_path_status;
use crate::{canonicalize_or_current, infer_project_name};

#[derive(Serialize)]
pub struct ProjectInfoSnapshot {
    pub name: String,
    pub root: String,
    pub config_file: String,
    pub config_version: String,
    pub config: PipelineConfig,
    pub layout: ProjectInfoLayout,
    pub runs: Vec<StageRecord>,
}

#[derive(Serialize)]
pub struct ProjectInfoLayout {
    pub meta_dir: String,
    pub runs_dir: String,
    pub cache_dir: String,
    pub repos_dir: String,
    pub outputs_dir: String,
}

/// Initialize a new dataset project at `root`.
pub fn init_project_command(root: &str, name: Option<String>) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ProjectLayout::new(&root_path);

    let project_name = match name {
        Some(n) => n,
        None => infer_project_name(&root_path),
    };

    for dir in [&layout.meta_dir, &layout.runs_dir, &layout.cache_dir, &layout.outputs_dir] {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let config = PipelineConfig::new(&project_name);
    let json = serde_json::to_string_pretty(&config)?;
    fs::write(&layout.config_path, json).with_context(|| {
        format!("Failed to write project config: {}", layout.config_path.display())
    })?;

    println!("Initialized alertslice project:");
    println!("  Name: {}", project_name);
    println!("  Root: {}", layout.root.display());
    println!("  Config: {}", layout.config_path.display());
    println!("  Revisions table: {}", layout.resolve(&config.inputs.revisions).display());
    println!("  Ground truth table: {}", layout.resolve(&config.inputs.ground_truth).display());
    println!("  Alerts dir: {}", layout.resolve(&config.inputs.alerts_dir).display());
    println!("  Outputs dir: {}", layout.outputs_dir.display());

    Ok(())
}

/// Show configuration, input status and the last run of every stage.
pub fn project_info_command(root: &str, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ProjectLayout::new(&root_path);
    let config = load_project_config(&layout)?;
    let ctx = alertslice_core::project::ProjectContext { layout, config };

    let mut runs = Vec::new();
    for stage in [Stage::AssembleVuln, Stage::AssembleFix, Stage::Reconcile, Stage::Augment] {
        if let Some(record) = read_stage_record(&ctx, stage)? {
            runs.push(record);
        }
    }

    if json {
        let layout = &ctx.layout;
        let snapshot = ProjectInfoSnapshot {
            name: ctx.config.name.clone(),
            root: layout.root.display().to_string(),
            config_file: layout.config_path.display().to_string(),
            config_version: ctx.config.config_version.clone(),
            config: ctx.config.clone(),
            layout: ProjectInfoLayout {
                meta_dir: layout.meta_dir.display().to_string(),
                runs_dir: layout.runs_dir.display().to_string(),
                cache_dir: layout.cache_dir.display().to_string(),
                repos_dir: layout.repos_dir.display().to_string(),
                outputs_dir: layout.outputs_dir.display().to_string(),
            },
            runs,
        };
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("alertslice project info:");
    println!("  Name: {}", ctx.config.name);
    println!("  Root: {}", ctx.layout.root.display());
    println!("  Config: {}", ctx.layout.config_path.display());
    println!("  Config version: {}", ctx.config.config_version);
    println!("  Ground truth source: {:?}", ctx.config.ground_truth_source);
    println!("  Workers: {} (queue depth {})", ctx.config.workers, ctx.config.queue_depth());
    println!("Inputs:");
    print_path_status("revisions", &ctx.revisions_path());
    print_path_status("ground truth", &ctx.ground_truth_path());
    print_path_status("alerts", &ctx.alerts_dir());
    println!("Outputs:");
    print_path_status("combined", &ctx.combined_path());
    print_path_status("augmented", &ctx.augmented_path());
    if runs.is_empty() {
        println!("Runs: (none)");
    } else {
        println!("Runs:");
        for run in &runs {
            println!(
                "- {}: {} (finished {})",
                run.stage,
                run.status.as_str(),
                run.finished_at
            );
        }
    }
    Ok(())
}
