use std::path::{Path, PathBuf};

use crate::model::Revision;

/// Logical layout of a dataset project on disk.
///
/// This is derived from a chosen root path. It does *not* perform any IO itself.
/// Callers are responsible for creating directories before writing into them.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Root directory of the project.
    pub root: PathBuf,
    /// Directory for internal metadata (.alertslice).
    pub meta_dir: PathBuf,
    /// Path to the pipeline config file (JSON).
    pub config_path: PathBuf,
    /// Directory holding one JSON record per executed stage.
    pub runs_dir: PathBuf,
    /// Scratch directory for fetched source files.
    pub cache_dir: PathBuf,
    /// Directory where repositories are cloned on demand.
    pub repos_dir: PathBuf,
    /// Directory for every produced table and dump.
    pub outputs_dir: PathBuf,
}

impl ProjectLayout {
    /// Compute the default layout for a project rooted at `root`.
    ///
    /// This does *not* touch the filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(".alertslice");
        let config_path = meta_dir.join("pipeline.json");
        let runs_dir = meta_dir.join("runs");
        let cache_dir = meta_dir.join("cache");
        let repos_dir = meta_dir.join("repos");
        let outputs_dir = root.join("outputs");

        Self { root, meta_dir, config_path, runs_dir, cache_dir, repos_dir, outputs_dir }
    }

    /// Resolve a configured path: absolute paths are kept, relative ones hang off `root`.
    pub fn resolve(&self, configured: &str) -> PathBuf {
        let path = Path::new(configured);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Per-revision table written by the assembler (`<stem>_vuln.csv` / `<stem>_fix.csv`).
    pub fn revision_table(&self, stem: &str, revision: Revision) -> PathBuf {
        self.outputs_dir.join(format!("{stem}_{}.csv", revision.as_str()))
    }

    /// Keyed JSON dump of a revision table written by the reconciler.
    pub fn revision_dump(&self, revision: Revision) -> PathBuf {
        self.outputs_dir.join(format!("dict_{}.json", revision.as_str()))
    }

    /// Record of the last run of a pipeline stage.
    pub fn run_record_path(&self, stage: &str) -> PathBuf {
        self.runs_dir.join(format!("{stage}.json"))
    }
}

/// Folder name git would pick when cloning `repo_url`.
pub fn repo_folder_name(repo_url: &str) -> String {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}
