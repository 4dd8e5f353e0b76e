use alertslice::commands::{
    assemble_command, augment_command, init_project_command, project_info_command,
    reconcile_command, run_command,
};
use alertslice::init_logging;
use anyhow::Result;
use clap::{Parser, Subcommand};

/// Builds a slice-augmented vulnerability dataset from static-analysis alerts.
///
/// This CLI is a thin wrapper around `alertslice-core`. All substantive logic
/// lives in the library so it can be tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "alertslice",
    version,
    about = "Slice-augmented vulnerability dataset builder",
    long_about = None
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new dataset project at the given root.
    ///
    /// This will:
    /// - Create a `.alertslice` metadata directory.
    /// - Create the `outputs` directory.
    /// - Write a `.alertslice/pipeline.json` config file with default settings.
    InitProject {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Optional project name. If omitted, the name is derived from the root directory.
        #[arg(long)]
        name: Option<String>,
    },

    /// Show configuration, input status and the last run of each stage.
    ProjectInfo {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Join revisions, ground truth and alerts into per-revision tables.
    Assemble {
        #[arg(long, default_value = ".")]
        root: String,

        /// Pipeline config (JSON or YAML) to use instead of `.alertslice/pipeline.json`.
        #[arg(long)]
        config: Option<String>,

        /// Which revision table(s) to build: vuln, fix or both.
        #[arg(long, default_value = "both")]
        revision: String,
    },

    /// Keep, per row, only the lines that do not carry over to the other revision.
    Reconcile {
        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long)]
        config: Option<String>,
    },

    /// Attach lightweight and pessimist slices to the combined table.
    Augment {
        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long)]
        config: Option<String>,

        /// Worker threads; overrides the configured value.
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Run assemble, reconcile and augment in order.
    Run {
        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long)]
        config: Option<String>,

        #[arg(long)]
        workers: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::InitProject { root, name } => init_project_command(&root, name)?,
        Command::ProjectInfo { root, json } => project_info_command(&root, json)?,
        Command::Assemble { root, config, revision } => {
            assemble_command(&root, config.as_deref(), &revision)?
        }
        Command::Reconcile { root, config } => reconcile_command(&root, config.as_deref())?,
        Command::Augment { root, config, workers } => {
            augment_command(&root, config.as_deref(), workers)?
        }
        Command::Run { root, config, workers } => run_command(&root, config.as_deref(), workers)?,
    }

    Ok(())
}
