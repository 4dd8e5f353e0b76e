use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::project::{PipelineConfig, ProjectLayout};

/// Convenience wrapper bundling layout and the loaded pipeline config.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub layout: ProjectLayout,
    pub config: PipelineConfig,
}

impl ProjectContext {
    /// Load the project config stored under `root`.
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self> {
        let layout = ProjectLayout::new(root);
        let config = load_project_config(&layout)?;
        Ok(Self { layout, config })
    }

    /// Use `root` for layout but take the config from an explicit file (JSON or YAML).
    pub fn with_config_file(root: impl AsRef<Path>, config_path: &Path) -> Result<Self> {
        let layout = ProjectLayout::new(root);
        let config = PipelineConfig::from_file(config_path)?;
        Ok(Self { layout, config })
    }

    pub fn revisions_path(&self) -> PathBuf {
        self.layout.resolve(&self.config.inputs.revisions)
    }

    pub fn ground_truth_path(&self) -> PathBuf {
        self.layout.resolve(&self.config.inputs.ground_truth)
    }

    pub fn alerts_dir(&self) -> PathBuf {
        self.layout.resolve(&self.config.inputs.alerts_dir)
    }

    pub fn combined_path(&self) -> PathBuf {
        self.layout.outputs_dir.join(&self.config.outputs.combined)
    }

    pub fn augmented_path(&self) -> PathBuf {
        self.layout.outputs_dir.join(&self.config.outputs.augmented)
    }

    /// Create the output, cache and run-record directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.layout.outputs_dir,
            &self.layout.runs_dir,
            &self.layout.cache_dir,
            &self.layout.repos_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Load the pipeline config JSON from disk for a given layout.
pub fn load_project_config(layout: &ProjectLayout) -> Result<PipelineConfig> {
    let config_json = std::fs::read_to_string(&layout.config_path).with_context(|| {
        format!("Failed to read project config at {}", layout.config_path.display())
    })?;
    let config: PipelineConfig =
        serde_json::from_str(&config_json).context("Failed to parse project config JSON")?;
    config.validate()?;
    Ok(config)
}
