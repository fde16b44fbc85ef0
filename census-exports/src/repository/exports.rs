//! Exports repository
//!
//! Handles communication with the export service:
//! - Starting export jobs
//! - Fetching job status
//! - Cancelling jobs

use anyhow::{Context, Result};
use async_trait::async_trait;
use census_client::{CensusClient, CreateExportResponse};
use census_core::domain::export::{ExportType, StatusUpdate};
use census_core::domain::filters::ExportFilters;
use std::sync::Arc;

/// Repository trait for export job operations
#[async_trait]
pub trait ExportRepository: Send + Sync {
    /// Asks the service to start exporting the full filtered dataset
    async fn create_export(
        &self,
        export_type: ExportType,
        filters: &ExportFilters,
    ) -> Result<CreateExportResponse>;

    /// Fetches the current status of a job, mapped to the client vocabulary
    async fn fetch_status(&self, job_id: &str) -> Result<StatusUpdate>;

    /// Cancels and deletes a job on the service
    async fn cancel_export(&self, job_id: &str) -> Result<()>;
}

/// HTTP implementation of ExportRepository
pub struct HttpExportRepository {
    client: Arc<CensusClient>,
}

impl HttpExportRepository {
    pub fn new(client: Arc<CensusClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExportRepository for HttpExportRepository {
    async fn create_export(
        &self,
        export_type: ExportType,
        filters: &ExportFilters,
    ) -> Result<CreateExportResponse> {
        self.client
            .create_export(export_type, filters)
            .await
            .with_context(|| format!("Failed to create {} job", export_type))
    }

    async fn fetch_status(&self, job_id: &str) -> Result<StatusUpdate> {
        let response = self
            .client
            .get_export_job(job_id)
            .await
            .with_context(|| format!("Failed to fetch status of job {}", job_id))?;

        Ok(response.into_update())
    }

    async fn cancel_export(&self, job_id: &str) -> Result<()> {
        self.client
            .delete_export_job(job_id)
            .await
            .with_context(|| format!("Failed to cancel job {}", job_id))
    }
}
