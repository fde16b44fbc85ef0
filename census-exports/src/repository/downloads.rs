//! Downloads repository
//!
//! Fetches finished export files and saves them locally.

use anyhow::{Context, Result};
use async_trait::async_trait;
use census_client::CensusClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Fallback when a suggested file name has no usable final component
const FALLBACK_FILE_NAME: &str = "export.csv";

/// Repository trait for delivering a finished export to the user
#[async_trait]
pub trait DownloadHandler: Send + Sync {
    /// Fetches `url` and stores it under `file_name`
    ///
    /// # Returns
    /// Where the file ended up
    async fn download(&self, url: &str, file_name: &str) -> Result<PathBuf>;
}

/// Saves downloads into a directory on disk
pub struct FileDownloader {
    client: Arc<CensusClient>,
    target_dir: PathBuf,
}

impl FileDownloader {
    pub fn new(client: Arc<CensusClient>, target_dir: PathBuf) -> Self {
        Self { client, target_dir }
    }

    /// Target path for a suggested name, confined to the target directory
    fn target_path(&self, file_name: &str) -> PathBuf {
        let name = Path::new(file_name)
            .file_name()
            .filter(|n| !n.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(FALLBACK_FILE_NAME));
        self.target_dir.join(name)
    }
}

#[async_trait]
impl DownloadHandler for FileDownloader {
    async fn download(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        let bytes = self
            .client
            .download_file(url)
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        tokio::fs::create_dir_all(&self.target_dir)
            .await
            .with_context(|| format!("Failed to create {:?}", self.target_dir))?;

        let path = self.target_path(file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;

        info!("Saved export to {:?} ({} bytes)", path, bytes.len());
        Ok(path)
    }
}
