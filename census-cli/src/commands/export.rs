//! Export command handler
//!
//! Requests an export and optionally waits for it to finish.

use anyhow::{Result, bail};
use census_core::domain::export::{ExportType, JobStatus};
use census_core::domain::filters::ExportFilters;
use census_exports::{ExportCoordinator, ExportOutcome};
use clap::Args;
use colored::*;
use std::collections::HashSet;

use crate::commands::jobs::{follow_jobs, print_job_summary};
use crate::types::{ExportKind, ScopeArg};

/// Arguments of `census export`
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Dataset to export
    #[arg(value_enum)]
    pub export_type: ExportKind,

    /// Rows to include
    #[arg(long, value_enum, default_value_t = ScopeArg::All)]
    pub scope: ScopeArg,

    /// Block filter ("all" for every block)
    #[arg(long)]
    pub block: Option<String>,

    /// Gram panchayat filter ("all" for every gram panchayat)
    #[arg(long)]
    pub gram_panchayat: Option<String>,

    /// Survey status filter ("all" for every status)
    #[arg(long)]
    pub status: Option<String>,

    /// Free-text search
    #[arg(long)]
    pub search: Option<String>,

    /// Extra filter as key=value; may be repeated
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Wait for the job to finish and download the file
    #[arg(short, long)]
    pub wait: bool,
}

impl ExportArgs {
    /// Filters from the dedicated flags, overridden by `--filter` pairs
    fn to_filters(&self) -> Result<ExportFilters> {
        let mut pairs: Vec<(String, String)> = [
            ("block", &self.block),
            ("gramPanchayat", &self.gram_panchayat),
            ("status", &self.status),
            ("search", &self.search),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key.to_string(), v)))
        .collect();

        for raw in &self.filters {
            pairs.push(ExportFilters::parse_pair(raw)?);
        }

        Ok(ExportFilters::from_pairs(pairs)?)
    }
}

pub async fn handle_export_command(args: ExportArgs, coordinator: &ExportCoordinator) -> Result<()> {
    let filters = args.to_filters()?;
    let export_type = ExportType::from(args.export_type);

    let outcome = coordinator
        .request_export(export_type, args.scope.into(), &filters)
        .await?;

    let job = match outcome {
        ExportOutcome::Local => {
            println!(
                "{}",
                "Current-page exports are built from the rows on screen; nothing was requested."
                    .yellow()
            );
            return Ok(());
        }
        ExportOutcome::ReusedCompleted { job, saved_to } => {
            println!(
                "{} Export {} is still current, saved to {}",
                "✓".green(),
                job.id().cyan(),
                saved_to.display()
            );
            return Ok(());
        }
        ExportOutcome::Created(job) => {
            println!("{} Export started", "✓".green());
            job
        }
        ExportOutcome::AttachedInFlight(job) => {
            println!("{}", "An identical export is already running.".yellow());
            job
        }
    };

    println!();
    print_job_summary(&job);

    if !args.wait {
        println!(
            "{}",
            "Run `census jobs watch` to follow progress.".dimmed()
        );
        return Ok(());
    }

    let job_id = job.job.id.clone();
    follow_jobs(coordinator, HashSet::from([job_id.clone()]), true).await?;

    if let Some(job) = coordinator.job(&job_id) {
        if job.status() == JobStatus::Failed {
            bail!(
                "Export job {} failed: {}",
                job_id,
                job.job.error.unwrap_or_default()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ExportArgs,
    }

    fn parse(argv: &[&str]) -> ExportArgs {
        TestCli::parse_from(std::iter::once("census").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_defaults_to_full_dataset() {
        let args = parse(&["children"]);
        assert_eq!(args.export_type, ExportKind::Children);
        assert_eq!(args.scope, ScopeArg::All);
        assert!(!args.wait);
        assert!(args.to_filters().unwrap().is_empty());
    }

    #[test]
    fn test_flags_and_pairs_build_filters() {
        let args = parse(&[
            "gram-panchayats",
            "--block",
            "B1",
            "--search",
            "old",
            "--filter",
            "gp=GP7",
            "--filter",
            "search=new",
        ]);
        let filters = args.to_filters().unwrap();

        assert_eq!(args.export_type, ExportKind::GramPanchayats);
        assert_eq!(filters.block.as_deref(), Some("B1"));
        assert_eq!(filters.gram_panchayat.as_deref(), Some("GP7"));
        assert_eq!(filters.search.as_deref(), Some("new"));
    }

    #[test]
    fn test_bad_filter_is_rejected() {
        assert!(parse(&["children", "--filter", "district=D1"]).to_filters().is_err());
        assert!(parse(&["children", "--filter", "block"]).to_filters().is_err());
    }
}
