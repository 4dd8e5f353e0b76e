use std::path::Path;

use alertslice_core::model::Revision;
use alertslice_core::project::ProjectContext;
use anyhow::{anyhow, Result};

use crate::canonicalize_or_current;

/// Open the project at `root`, taking the config from `config` when given.
pub fn open_context(root: &str, config: Option<&str>) -> Result<ProjectContext> {
    let root_path = canonicalize_or_current(root)?;
    let ctx = match config {
        Some(path) => ProjectContext::with_config_file(&root_path, Path::new(path))?,
        None => ProjectContext::from_root(&root_path)?,
    };
    ctx.ensure_dirs()?;
    Ok(ctx)
}

/// Parse the `--revision` selector: `vuln`, `fix` or `both`.
pub fn parse_revisions(value: &str) -> Result<Vec<Revision>> {
    match value.trim() {
        "both" => Ok(vec![Revision::Vuln, Revision::Fix]),
        other => Revision::parse(other)
            .map(|r| vec![r])
            .ok_or_else(|| anyhow!("Unknown revision '{other}' (expected vuln, fix or both)")),
    }
}

/// Helper to print whether a path exists.
pub fn print_path_status(label: &str, path: &Path) {
    let exists = path.exists();
    println!("- {label}: {} ({})", if exists { "OK" } else { "MISSING" }, path.display());
}
