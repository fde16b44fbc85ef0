//! Tracker configuration
//!
//! Defines all configurable parameters for the export tracker including the
//! service connection, storage locations, polling interval and retention.

use std::path::PathBuf;
use std::time::Duration;

/// Export tracker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Export service base URL (e.g., "http://localhost:8080")
    pub api_url: String,

    /// Bearer token for the export service
    pub api_token: Option<String>,

    /// Directory holding the persisted job list
    pub state_dir: PathBuf,

    /// Directory finished exports are saved into
    pub download_dir: PathBuf,

    /// How often each in-flight job is polled
    pub poll_interval: Duration,

    /// How long job records are kept after creation
    pub retention: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(api_url: String) -> Self {
        Self {
            api_url,
            api_token: None,
            state_dir: PathBuf::from(".census"),
            download_dir: PathBuf::from("."),
            poll_interval: Duration::from_secs(5),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - CENSUS_API_URL (required)
    /// - CENSUS_API_TOKEN (optional)
    /// - CENSUS_STATE_DIR (optional, default: .census)
    /// - CENSUS_DOWNLOAD_DIR (optional, default: .)
    /// - CENSUS_POLL_INTERVAL (optional, seconds, default: 5)
    /// - CENSUS_RETENTION_DAYS (optional, default: 7)
    pub fn from_env() -> anyhow::Result<Self> {
        let api_url = std::env::var("CENSUS_API_URL")
            .map_err(|_| anyhow::anyhow!("CENSUS_API_URL environment variable not set"))?;

        let mut config = Self::new(api_url);

        config.api_token = std::env::var("CENSUS_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        if let Ok(dir) = std::env::var("CENSUS_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("CENSUS_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }

        if let Some(interval) = std::env::var("CENSUS_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.poll_interval = Duration::from_secs(interval);
        }

        if let Some(days) = std::env::var("CENSUS_RETENTION_DAYS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.retention = Duration::from_secs(days * 24 * 60 * 60);
        }

        Ok(config)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.api_token = if token.is_empty() { None } else { Some(token) };
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("api_url cannot be empty");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.retention.is_zero() {
            anyhow::bail!("retention must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8080".to_string())
    }
}
