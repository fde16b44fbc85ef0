//! Census HTTP Client
//!
//! A small, type-safe HTTP client for the survey service's export endpoints.
//!
//! The client is an explicitly constructed value holding its base URL and
//! optional bearer token, so every component that talks to the service gets
//! it passed in rather than reaching for shared global state.
//!
//! # Example
//!
//! ```no_run
//! use census_client::CensusClient;
//! use census_core::domain::export::ExportType;
//! use census_core::domain::filters::ExportFilters;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CensusClient::new("http://localhost:8080").with_token("secret");
//!
//!     let created = client
//!         .create_export(ExportType::Children, &ExportFilters::default())
//!         .await?;
//!
//!     println!("Started export job {}", created.job_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod exports;

// Re-export commonly used types
pub use census_core::dto::export::{CreateExportResponse, ExportJobStatusResponse};
pub use error::{ClientError, Result};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// HTTP client for the survey export API
///
/// Endpoints:
/// - `POST /export/{resource}` starts a job
/// - `GET /export/jobs/{id}` reports job status
/// - `DELETE /export/jobs/{id}` cancels a job
#[derive(Debug, Clone)]
pub struct CensusClient {
    /// Base URL of the service (e.g., "http://localhost:8080")
    base_url: String,
    /// Bearer token sent with every request
    token: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl CensusClient {
    /// Create a new client
    ///
    /// # Example
    /// ```
    /// use census_client::CensusClient;
    ///
    /// let client = CensusClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use census_client::CensusClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = CensusClient::with_client("http://localhost:8080", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client,
        }
    }

    /// Attach a bearer token to every subsequent request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.is_empty() { None } else { Some(token) };
        self
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
