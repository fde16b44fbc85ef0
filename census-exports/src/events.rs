//! Job notifications for UI consumers

use census_core::domain::export::{JobId, JobStatus};

/// Capacity of the notification channel; slow subscribers lag and skip
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// A new job was accepted by the service. Never sent for reused jobs.
    Started { job_id: JobId, file_name: String },
    /// Status or progress of an in-flight job changed
    Progress {
        job_id: JobId,
        status: JobStatus,
        progress: Option<u8>,
    },
    Completed { job_id: JobId, download_url: String },
    Failed { job_id: JobId, error: String },
    Dismissed { job_id: JobId },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Started { job_id, .. }
            | JobEvent::Progress { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Dismissed { job_id } => job_id,
        }
    }
}
