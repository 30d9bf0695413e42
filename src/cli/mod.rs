pub(crate) mod commands;
pub(crate) mod output;

use crate::config::AppConfig;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use output::Output;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "consld8", version)]
#[command(about = "Consolidate a split Unraid share folder onto a single disk", long_about = None)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging and per-file progress
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List array disks and pools with their free space
    Disks,

    /// List user shares
    Shares,

    /// List the top-level folders of a share and which disks hold them
    Folders {
        /// Share name
        share: String,
    },

    /// Build and show a consolidation plan without executing it
    Plan(TargetArgs),

    /// Execute a consolidation plan (a dry run unless --force is given)
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Actually move files
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Consolidate every split folder of a share onto the disk holding most of it
    Auto {
        /// User share to consolidate
        #[arg(short, long)]
        share: String,

        /// Bytes to keep free on each destination (overrides SAFETY_MARGIN)
        #[arg(long)]
        safety_margin: Option<u64>,

        /// Actually move files
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// List recent sessions
    History {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the stored report of a session
    Report {
        /// Session id
        id: Uuid,
    },

    /// Show settings, or change and save them
    Settings {
        /// Setting to change, e.g. SAFETY_MARGIN=10737418240 (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },
}

/// Which subfolder to consolidate, and where.
#[derive(Args, Clone)]
pub struct TargetArgs {
    /// User share containing the folder
    #[arg(short, long)]
    pub share: String,

    /// Folder inside the share, e.g. "TV/Some Show"
    #[arg(short, long)]
    pub folder: String,

    /// Disk that receives every file, e.g. "disk2"
    #[arg(short, long)]
    pub disk: String,

    /// Bytes to keep free on the destination (overrides SAFETY_MARGIN)
    #[arg(long)]
    pub safety_margin: Option<u64>,

    /// Path relative to the folder to leave out; also resolves a conflict (repeatable)
    #[arg(long = "exclude", value_name = "PATH")]
    pub excludes: Vec<PathBuf>,
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let out = Output::new(cli.json);

    match cli.command {
        Commands::Disks => commands::disks(config, &out).await,
        Commands::Shares => commands::shares(config, &out).await,
        Commands::Folders { share } => commands::folders(config, share, &out).await,
        Commands::Plan(target) => commands::plan(config, target, &out).await,
        Commands::Run { target, force } => {
            commands::run(config, target, force, cli.verbose, &out).await
        }
        Commands::Auto { share, safety_margin, force } => {
            commands::auto(config, share, safety_margin, force, cli.verbose, &out).await
        }
        Commands::History { limit } => commands::history(&config, limit, &out),
        Commands::Report { id } => commands::report(&config, id, &out),
        Commands::Settings { assignments } => commands::settings(config, &assignments, &out),
    }
}
