//! Key/value storage backends

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable string storage addressed by key
pub trait StorageBackend: Send + Sync {
    /// Returns `None` when nothing was stored under `key`
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the value under `key`; durable once this returns
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StorageBackend for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
        Ok(Some(contents))
    }

    /// Writes atomically using write-to-temp-then-rename
    fn save(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory {:?}", self.dir))?;

        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");

        let mut temp_file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;
        temp_file
            .write_all(value.as_bytes())
            .context("Failed to write to temp file")?;
        temp_file.sync_all().context("Failed to sync temp file")?;

        fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to rename temp file to {:?}", path))?;

        Ok(())
    }
}

/// Process-local storage, for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one entry
    pub fn with_entry(key: &str, value: impl Into<String>) -> Self {
        let storage = Self::new();
        storage.put(key, value.into());
        storage
    }

    /// Raw value under `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, value: String) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
    }
}

impl StorageBackend for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, value.to_string());
        Ok(())
    }
}
