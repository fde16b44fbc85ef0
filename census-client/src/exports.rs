//! Export-related API endpoints

use census_core::domain::export::ExportType;
use census_core::domain::filters::ExportFilters;
use census_core::dto::export::{CreateExportResponse, ExportJobStatusResponse};
use tracing::debug;

use crate::CensusClient;
use crate::error::{ClientError, Result};

impl CensusClient {
    // =============================================================================
    // Export Jobs
    // =============================================================================

    /// Start a server-side export of the full filtered dataset
    ///
    /// Only applied filters are sent as query parameters.
    ///
    /// # Returns
    /// The identifier and creation time of the new job
    pub async fn create_export(
        &self,
        export_type: ExportType,
        filters: &ExportFilters,
    ) -> Result<CreateExportResponse> {
        let url = format!("{}/export/{}", self.base_url, export_type.resource());
        debug!("POST {} ({} filter(s))", url, filters.applied().len());
        let request = self.client.post(&url).query(&filters.query_params());
        let response = self.authorize(request).send().await?;

        self.handle_response(response).await
    }

    /// Get the current status of an export job
    pub async fn get_export_job(&self, job_id: &str) -> Result<ExportJobStatusResponse> {
        let url = self.job_url(job_id)?;
        let response = self.authorize(self.client.get(&url)).send().await?;

        self.handle_response(response).await
    }

    /// Cancel and delete an export job on the server
    pub async fn delete_export_job(&self, job_id: &str) -> Result<()> {
        let url = self.job_url(job_id)?;
        debug!("DELETE {}", url);
        let response = self.authorize(self.client.delete(&url)).send().await?;

        self.handle_empty_response(response).await
    }

    /// Fetch a finished export file
    ///
    /// Relative links are resolved against the base URL. The bearer token is
    /// only sent to the service's own host.
    pub async fn download_file(&self, download_url: &str) -> Result<Vec<u8>> {
        let (url, same_origin) = if download_url.starts_with("http://")
            || download_url.starts_with("https://")
        {
            let same_origin = download_url.starts_with(&format!("{}/", self.base_url));
            (download_url.to_string(), same_origin)
        } else {
            (
                format!("{}/{}", self.base_url, download_url.trim_start_matches('/')),
                true,
            )
        };

        debug!("Downloading {} (authorized: {})", url, same_origin);
        let request = self.client.get(&url);
        let request = if same_origin {
            self.authorize(request)
        } else {
            request
        };
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn job_url(&self, job_id: &str) -> Result<String> {
        if job_id.is_empty() || job_id.contains('/') {
            return Err(ClientError::InvalidRequest(format!(
                "Invalid job id '{}'",
                job_id
            )));
        }
        Ok(format!("{}/export/jobs/{}", self.base_url, job_id))
    }
}
