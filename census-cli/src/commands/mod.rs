//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod export;
mod jobs;

pub use export::ExportArgs;
pub use jobs::JobsCommands;

use anyhow::Result;
use census_exports::{Config, ExportCoordinator};
use clap::Subcommand;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Request an export
    Export(ExportArgs),
    /// Inspect and manage known export jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },
}

/// Handle a CLI command
///
/// Loads the job list, resumes polling of unfinished jobs, routes the
/// command to its handler and stops all pollers afterwards.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let coordinator = ExportCoordinator::from_config(config)?;
    coordinator.init();

    let result = match command {
        Commands::Export(args) => export::handle_export_command(args, &coordinator).await,
        Commands::Jobs { command } => jobs::handle_jobs_command(command, &coordinator).await,
    };

    coordinator.shutdown();
    result
}
