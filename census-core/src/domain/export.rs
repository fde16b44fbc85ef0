//! Export job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::filters::ExportFilters;

/// Opaque job identifier assigned by the remote export service
pub type JobId = String;

/// Message recorded when the service reports a failure without a reason
pub const DEFAULT_FAILURE_MESSAGE: &str = "Export failed";

/// Message recorded when the service reports completion without a file
pub const MISSING_DOWNLOAD_MESSAGE: &str = "Export completed without a download link";

/// Dataset an export covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportType {
    #[serde(rename = "children-export")]
    Children,
    #[serde(rename = "gram-panchayat-export")]
    GramPanchayats,
}

impl ExportType {
    /// Name used inside job keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::Children => "children-export",
            ExportType::GramPanchayats => "gram-panchayat-export",
        }
    }

    /// Path segment of the creation endpoint (`POST /export/{resource}`)
    pub fn resource(&self) -> &'static str {
        match self {
            ExportType::Children => "children",
            ExportType::GramPanchayats => "gram-panchayats",
        }
    }

    /// Stem used for suggested file names
    pub fn file_stem(&self) -> &'static str {
        match self {
            ExportType::Children => "children",
            ExportType::GramPanchayats => "gram_panchayats",
        }
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an export covers the visible page or the whole filtered dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportScope {
    /// Rows currently loaded by the caller; formatted locally
    Current,
    /// Full filtered dataset; processed by the remote service
    All,
}

impl ExportScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportScope::Current => "current",
            ExportScope::All => "all",
        }
    }
}

impl fmt::Display for ExportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side job status
///
/// `Pending -> Processing -> {Completed | Failed}`. A job may be observed
/// directly in `Processing` if the service skips the pending phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status observation for a job, already mapped to the client vocabulary
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub progress: Option<f64>,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

/// One export request tracked by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub file_name: String,
}

impl ExportJob {
    /// A freshly accepted job, before its first poll
    pub fn pending(id: impl Into<JobId>, created_at: DateTime<Utc>, file_name: String) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            progress: None,
            download_url: None,
            error: None,
            created_at,
            file_name,
        }
    }

    /// Applies a status observation.
    ///
    /// Keeps `download_url` present iff completed and `error` present iff
    /// failed. A completion without a download link is recorded as a failure.
    pub fn apply_status(&mut self, update: StatusUpdate) {
        match update.status {
            JobStatus::Pending | JobStatus::Processing => {
                self.status = update.status;
                self.progress = update.progress.map(clamp_percentage);
                self.download_url = None;
                self.error = None;
            }
            JobStatus::Completed => match update.download_url.filter(|url| !url.is_empty()) {
                Some(url) => {
                    self.status = JobStatus::Completed;
                    self.progress = None;
                    self.download_url = Some(url);
                    self.error = None;
                }
                None => self.fail(MISSING_DOWNLOAD_MESSAGE.to_string()),
            },
            JobStatus::Failed => {
                let reason = update
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                self.fail(reason);
            }
        }
    }

    fn fail(&mut self, reason: String) {
        self.status = JobStatus::Failed;
        self.progress = None;
        self.download_url = None;
        self.error = Some(reason);
    }
}

fn clamp_percentage(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

/// Export job with the metadata used for deduplication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedExportJob {
    #[serde(flatten)]
    pub job: ExportJob,
    /// Computed once at creation, never recomputed
    pub job_key: String,
    pub scope: ExportScope,
    pub filters: ExportFilters,
    /// After this instant the job no longer satisfies new requests
    pub expires_at: DateTime<Utc>,
}

impl EnhancedExportJob {
    pub fn id(&self) -> &str {
        &self.job.id
    }

    pub fn status(&self) -> JobStatus {
        self.job.status
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Eligible to satisfy a new request with the same key
    pub fn is_reusable(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && self.job.status != JobStatus::Failed
    }
}
