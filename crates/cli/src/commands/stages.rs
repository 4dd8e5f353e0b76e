use alertslice_core::services::backends::ExternalOracles;
use alertslice_core::services::pipeline::{
    assemble_stage, augment_stage, reconcile_stage, run_all,
};
use anyhow::Result;

use crate::commands::{open_context, parse_revisions};

/// Build the per-revision tables selected by `revision`.
pub fn assemble_command(root: &str, config: Option<&str>, revision: &str) -> Result<()> {
    let ctx = open_context(root, config)?;
    let oracles = ExternalOracles::from_context(&ctx);
    for revision in parse_revisions(revision)? {
        let stats = assemble_stage(&ctx, &oracles, revision)?;
        let output = ctx.layout.revision_table(&ctx.config.outputs.table_stem, revision);
        println!("Assembled {revision} table:");
        println!("  Output: {}", output.display());
        println!("  Keys: {}", stats.keys);
        println!("  Ground truth rows: {}", stats.ground_truth_rows);
        println!("  Tool rows: {}", stats.tool_rows);
        println!("  Skipped keys: {}", stats.skipped_keys);
    }
    Ok(())
}

/// Reconcile the vulnerable and fixed tables into the combined table.
pub fn reconcile_command(root: &str, config: Option<&str>) -> Result<()> {
    let ctx = open_context(root, config)?;
    let oracles = ExternalOracles::from_context(&ctx);
    let stats = reconcile_stage(&ctx, &oracles)?;
    println!("Reconciled tables:");
    println!("  Output: {}", ctx.combined_path().display());
    println!("  Rows: {}", stats.rows_written());
    println!("  Unmatched keys: {}", stats.unmatched_keys);
    println!("  Mapping errors: {}", stats.mapping_errors);
    Ok(())
}

/// Attach both slices to every row of the combined table.
pub fn augment_command(root: &str, config: Option<&str>, workers: Option<usize>) -> Result<()> {
    let ctx = open_context(root, config)?;
    let oracles = ExternalOracles::from_context(&ctx);
    let stats = augment_stage(&ctx, &oracles, workers)?;
    println!("Augmented table:");
    println!("  Output: {}", ctx.augmented_path().display());
    println!("  Rows: {} of {}", stats.augmented, stats.rows);
    println!("  Failed: {}", stats.failed);
    Ok(())
}

/// Run every stage in order.
pub fn run_command(root: &str, config: Option<&str>, workers: Option<usize>) -> Result<()> {
    let ctx = open_context(root, config)?;
    let oracles = ExternalOracles::from_context(&ctx);
    let report = run_all(&ctx, &oracles, workers)?;
    println!("Pipeline finished:");
    println!("  Vuln rows: {}", report.vuln.rows_written());
    println!("  Fix rows: {}", report.fix.rows_written());
    println!("  Combined rows: {}", report.reconcile.rows_written());
    println!("  Augmented rows: {}", report.augment.augmented);
    println!("  Output: {}", ctx.augmented_path().display());
    Ok(())
}
