//! Errors surfaced by the export coordinator

use census_core::domain::export::{JobId, JobStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    /// The service refused or failed to start the export; nothing was stored
    #[error("Failed to start export: {0:#}")]
    CreateFailed(anyhow::Error),

    #[error("Export job {0} not found")]
    NotFound(JobId),

    #[error("Export job {id} is {status}, not completed")]
    NotCompleted { id: JobId, status: JobStatus },

    #[error("Failed to download export: {0:#}")]
    DownloadFailed(anyhow::Error),
}
