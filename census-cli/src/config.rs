//! Configuration module
//!
//! Global CLI options. Every flag falls back to the matching environment
//! variable and then to the tracker's default.

use census_exports::Config;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Options shared by all commands
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Export service URL
    #[arg(
        long,
        global = true,
        env = "CENSUS_API_URL",
        default_value = "http://localhost:8080"
    )]
    pub api_url: String,

    /// Bearer token for the export service
    #[arg(long, global = true, env = "CENSUS_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Directory holding the job list
    #[arg(long, global = true, env = "CENSUS_STATE_DIR", default_value = ".census")]
    pub state_dir: PathBuf,

    /// Directory exports are saved into
    #[arg(long, global = true, env = "CENSUS_DOWNLOAD_DIR", default_value = ".")]
    pub download_dir: PathBuf,

    /// Seconds between status checks
    #[arg(long, global = true, env = "CENSUS_POLL_INTERVAL", default_value_t = 5)]
    pub poll_interval: u64,

    /// Days job records are kept
    #[arg(long, global = true, env = "CENSUS_RETENTION_DAYS", default_value_t = 7)]
    pub retention_days: u64,
}

impl GlobalArgs {
    /// Tracker configuration for these options
    pub fn to_config(&self) -> Config {
        let mut config = Config::new(self.api_url.clone());
        if let Some(token) = &self.token {
            config = config.with_token(token.clone());
        }
        config.state_dir = self.state_dir.clone();
        config.download_dir = self.download_dir.clone();
        config.poll_interval = Duration::from_secs(self.poll_interval);
        config.retention = Duration::from_secs(self.retention_days * 24 * 60 * 60);
        config
    }
}
