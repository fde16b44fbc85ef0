//! Jobs command handlers
//!
//! Handles listing, watching, downloading and dismissing known export jobs.

use anyhow::Result;
use census_core::domain::export::{EnhancedExportJob, JobId, JobStatus};
use census_exports::{ExportCoordinator, JobEvent};
use chrono::{Local, Utc};
use clap::Subcommand;
use colored::*;
use std::collections::HashSet;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::id_resolver::resolve_job_id;

/// Jobs subcommands
#[derive(Subcommand)]
pub enum JobsCommands {
    /// List known export jobs, newest first
    List {
        /// Check the status of unfinished jobs before listing
        #[arg(short, long)]
        refresh: bool,
    },
    /// Follow unfinished jobs until they complete or fail
    Watch {
        /// Download files as their jobs complete
        #[arg(short, long)]
        download: bool,
    },
    /// Download the file of a completed job
    Download {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Remove a job, cancelling it if it has not completed
    Dismiss {
        /// Job ID or unambiguous prefix
        id: String,
    },
}

/// Handle jobs commands
pub async fn handle_jobs_command(
    command: JobsCommands,
    coordinator: &ExportCoordinator,
) -> Result<()> {
    match command {
        JobsCommands::List { refresh } => list_jobs(coordinator, refresh).await,
        JobsCommands::Watch { download } => watch_jobs(coordinator, download).await,
        JobsCommands::Download { id } => download_job(coordinator, &id).await,
        JobsCommands::Dismiss { id } => dismiss_job(coordinator, &id).await,
    }
}

async fn list_jobs(coordinator: &ExportCoordinator, refresh: bool) -> Result<()> {
    if refresh {
        for job in coordinator.store().in_flight() {
            coordinator.poller().tick(job.id()).await;
        }
    }

    let jobs = coordinator.jobs();

    if jobs.is_empty() {
        println!("{}", "No export jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} export job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

async fn watch_jobs(coordinator: &ExportCoordinator, download: bool) -> Result<()> {
    let pending: HashSet<JobId> = coordinator
        .store()
        .in_flight()
        .into_iter()
        .map(|job| job.job.id)
        .collect();

    if pending.is_empty() {
        println!("{}", "No exports in progress.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Watching {} export job(s), Ctrl+C to stop", pending.len()).bold()
    );
    follow_jobs(coordinator, pending, download).await
}

async fn download_job(coordinator: &ExportCoordinator, id: &str) -> Result<()> {
    let job_id = resolve_job_id(&coordinator.jobs(), id)?;
    let path = coordinator.download(&job_id).await?;

    println!("{} Saved to {}", "✓".green(), path.display());
    Ok(())
}

async fn dismiss_job(coordinator: &ExportCoordinator, id: &str) -> Result<()> {
    let job_id = resolve_job_id(&coordinator.jobs(), id)?;
    coordinator.dismiss(&job_id).await?;

    println!("{} Dismissed job {}", "✓".green(), job_id.dimmed());
    Ok(())
}

/// Prints events of the given jobs until none of them is in flight.
///
/// With `download`, each completed job's file is saved as it arrives.
pub(crate) async fn follow_jobs(
    coordinator: &ExportCoordinator,
    mut job_ids: HashSet<JobId>,
    download: bool,
) -> Result<()> {
    let mut events = coordinator.subscribe();

    // Jobs may have settled before the subscription existed
    job_ids.retain(|id| {
        coordinator
            .job(id)
            .is_some_and(|job| job.status().is_in_flight())
    });

    while !job_ids.is_empty() {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Stopped watching; unfinished jobs keep running on the service.".yellow());
                return Ok(());
            }
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Skipped {} job event(s)", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if !job_ids.contains(event.job_id()) {
            continue;
        }

        print_event(&event);

        match &event {
            JobEvent::Completed { job_id, .. } => {
                job_ids.remove(job_id);
                if download {
                    match coordinator.download(job_id).await {
                        Ok(path) => {
                            println!("    Saved to {}", path.display().to_string().cyan())
                        }
                        Err(e) => {
                            warn!("Could not download job {}: {:#}", job_id, e);
                            println!("    {} {}", "Download failed:".red(), e);
                        }
                    }
                }
            }
            JobEvent::Failed { job_id, .. } | JobEvent::Dismissed { job_id } => {
                job_ids.remove(job_id);
            }
            JobEvent::Started { .. } | JobEvent::Progress { .. } => {}
        }
    }

    Ok(())
}

/// Print a job summary
pub(crate) fn print_job_summary(job: &EnhancedExportJob) {
    let now = Utc::now();

    println!("  {} Job {}", "▸".cyan(), job.id().dimmed());
    println!("    File:     {}", job.job.file_name);
    match job.job.progress {
        Some(progress) if job.status().is_in_flight() => println!(
            "    Status:   {} {}",
            colorize_status(job.status()),
            progress_bar(progress)
        ),
        _ => println!("    Status:   {}", colorize_status(job.status())),
    }
    println!(
        "    Created:  {}",
        job.job
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );

    let expires = job
        .expires_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string();
    if job.is_expired(now) {
        println!("    Expires:  {} {}", expires.dimmed(), "(stale)".yellow());
    } else {
        println!("    Expires:  {}", expires.dimmed());
    }

    let applied = job.filters.applied();
    if !applied.is_empty() {
        let filters: Vec<String> = applied
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        println!("    Filters:  {}", filters.join(", "));
    }

    if let Some(error) = &job.job.error {
        println!("    Error:    {}", error.red());
    }
    println!();
}

fn print_event(event: &JobEvent) {
    match event {
        JobEvent::Started { job_id, file_name } => {
            println!("  {} {} started ({})", "▸".cyan(), job_id.dimmed(), file_name)
        }
        JobEvent::Progress {
            job_id,
            status,
            progress,
        } => {
            let bar = progress.map(progress_bar).unwrap_or_default();
            println!(
                "  {} {} {} {}",
                "▸".cyan(),
                job_id.dimmed(),
                colorize_status(*status),
                bar
            )
        }
        JobEvent::Completed { job_id, .. } => {
            println!("  {} {} completed", "✓".green(), job_id.dimmed())
        }
        JobEvent::Failed { job_id, error } => {
            println!("  {} {} failed: {}", "✗".red(), job_id.dimmed(), error.red())
        }
        JobEvent::Dismissed { job_id } => {
            println!("  {} {} dismissed", "-".dimmed(), job_id.dimmed())
        }
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Processing => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}

fn progress_bar(progress: u8) -> String {
    const WIDTH: usize = 20;
    let filled = (usize::from(progress.min(100)) * WIDTH) / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        progress
    )
}
