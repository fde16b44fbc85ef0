//! Persisted export job list
//!
//! The store never fails towards its caller. Unreadable or malformed data is
//! treated as "no known jobs" and failed writes are logged; the in-memory view
//! stays authoritative for the running process.

use census_core::domain::export::EnhancedExportJob;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::store::storage::StorageBackend;

/// Key the job list is stored under
pub const STORAGE_KEY: &str = "export_jobs";

/// Collection of known export jobs, written through to a storage backend
pub struct JobStore {
    backend: Arc<dyn StorageBackend>,
    retention: Duration,
    jobs: Mutex<Vec<EnhancedExportJob>>,
}

impl JobStore {
    /// Creates an empty store; call [`JobStore::load`] to read persisted jobs
    pub fn new(backend: Arc<dyn StorageBackend>, retention: Duration) -> Self {
        Self {
            backend,
            retention,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Reads the persisted list, dropping jobs created before the retention
    /// window. Returns the number of jobs kept.
    pub fn load(&self, now: DateTime<Utc>) -> usize {
        let loaded = self.read_persisted();
        let total = loaded.len();
        let cutoff = now - self.retention;

        let kept: Vec<EnhancedExportJob> = loaded
            .into_iter()
            .filter(|job| job.job.created_at >= cutoff)
            .collect();

        let dropped = total - kept.len();
        let count = kept.len();
        let mut jobs = self.lock();
        *jobs = kept;

        if dropped > 0 {
            info!("Dropped {} export job(s) past retention", dropped);
            self.persist(&jobs);
        }

        debug!("Loaded {} export job(s)", count);
        count
    }

    /// All known jobs
    pub fn list(&self) -> Vec<EnhancedExportJob> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<EnhancedExportJob> {
        self.lock().iter().find(|job| job.id() == id).cloned()
    }

    /// Inserts the job or replaces the one with the same id
    pub fn upsert(&self, job: EnhancedExportJob) {
        let mut jobs = self.lock();
        match jobs.iter_mut().find(|existing| existing.id() == job.id()) {
            Some(existing) => *existing = job,
            None => jobs.push(job),
        }
        self.persist(&jobs);
    }

    /// Replaces the job only if it is still present.
    ///
    /// Returns `false` when the job was removed in the meantime, so a late
    /// poll result cannot bring a dismissed job back.
    pub fn update_existing(&self, job: EnhancedExportJob) -> bool {
        let mut jobs = self.lock();
        let Some(existing) = jobs.iter_mut().find(|existing| existing.id() == job.id()) else {
            return false;
        };
        *existing = job;
        self.persist(&jobs);
        true
    }

    /// Deletes the job with this id; returns whether it existed
    pub fn remove(&self, id: &str) -> bool {
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|job| job.id() != id);
        let removed = jobs.len() != before;
        if removed {
            self.persist(&jobs);
        }
        removed
    }

    /// First job with this key that is unexpired and not failed
    pub fn find_reusable(&self, job_key: &str, now: DateTime<Utc>) -> Option<EnhancedExportJob> {
        self.lock()
            .iter()
            .find(|job| job.job_key == job_key && job.is_reusable(now))
            .cloned()
    }

    /// Jobs still pending or processing
    pub fn in_flight(&self) -> Vec<EnhancedExportJob> {
        self.lock()
            .iter()
            .filter(|job| job.status().is_in_flight())
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EnhancedExportJob>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_persisted(&self) -> Vec<EnhancedExportJob> {
        let raw = match self.backend.load(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read export jobs, starting empty: {:#}", e);
                return Vec::new();
            }
        };

        let records: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!("Stored export jobs are malformed, starting empty: {}", e);
                return Vec::new();
            }
        };

        records
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(job) => Some(job),
                Err(e) => {
                    warn!("Skipping malformed export job record: {}", e);
                    None
                }
            })
            .collect()
    }

    fn persist(&self, jobs: &[EnhancedExportJob]) {
        let serialized = match serde_json::to_string(jobs) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!("Failed to serialize export jobs: {}", e);
                return;
            }
        };

        if let Err(e) = self.backend.save(STORAGE_KEY, &serialized) {
            warn!("Failed to persist export jobs: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::storage::MemoryStorage;
    use census_core::domain::export::{ExportJob, ExportScope, JobStatus, StatusUpdate};
    use census_core::domain::filters::ExportFilters;

    fn now() -> DateTime<Utc> {
        "2024-01-15T10:00:00Z".parse().unwrap()
    }

    fn job(id: &str, key: &str, created_at: DateTime<Utc>) -> EnhancedExportJob {
        EnhancedExportJob {
            job: ExportJob::pending(id, created_at, format!("{}.csv", id)),
            job_key: key.to_string(),
            scope: ExportScope::All,
            filters: ExportFilters::default(),
            expires_at: now() + Duration::hours(17),
        }
    }

    fn store_with(backend: Arc<MemoryStorage>) -> JobStore {
        JobStore::new(backend, Duration::days(7))
    }

    fn set_status(job: &mut EnhancedExportJob, status: JobStatus) {
        job.job.apply_status(StatusUpdate {
            status,
            progress: None,
            download_url: Some("https://x/file.csv".to_string()),
            error: None,
        });
    }

    #[test]
    fn test_upsert_persists_and_replaces() {
        let backend = Arc::new(MemoryStorage::new());
        let store = store_with(backend.clone());

        store.upsert(job("a", "k", now()));
        let mut updated = job("a", "k", now());
        set_status(&mut updated, JobStatus::Processing);
        store.upsert(updated);

        assert_eq!(store.list().len(), 1);
        assert_eq!(store.get("a").unwrap().status(), JobStatus::Processing);

        let reloaded = store_with(backend);
        assert_eq!(reloaded.load(now()), 1);
        assert_eq!(reloaded.get("a").unwrap().status(), JobStatus::Processing);
    }

    #[test]
    fn test_load_restores_timestamps() {
        let backend = Arc::new(MemoryStorage::new());
        let store = store_with(backend.clone());
        let created = now() - Duration::hours(3);
        store.upsert(job("a", "k", created));

        let raw = backend.get(STORAGE_KEY).unwrap();
        assert!(raw.contains("\"createdAt\":\"2024-01-15T07:00:00Z\""));

        let reloaded = store_with(backend);
        reloaded.load(now());
        let loaded = reloaded.get("a").unwrap();
        assert_eq!(loaded.job.created_at, created);
        assert_eq!(loaded.expires_at, now() + Duration::hours(17));
    }

    #[test]
    fn test_retention_drops_old_jobs_and_rewrites() {
        let backend = Arc::new(MemoryStorage::new());
        let seed = store_with(backend.clone());
        seed.upsert(job("old", "k1", now() - Duration::days(8)));
        seed.upsert(job("recent", "k2", now() - Duration::days(6)));

        let store = store_with(backend.clone());
        assert_eq!(store.load(now()), 1);
        assert!(store.get("old").is_none());
        assert!(store.get("recent").is_some());

        let raw = backend.get(STORAGE_KEY).unwrap();
        assert!(!raw.contains("\"old\""));
    }

    #[test]
    fn test_corrupt_storage_is_empty() {
        let backend = Arc::new(MemoryStorage::with_entry(STORAGE_KEY, "{not json"));
        let store = store_with(backend);
        assert_eq!(store.load(now()), 0);
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let good = serde_json::to_value(job("a", "k", now())).unwrap();
        let raw = serde_json::to_string(&vec![good, serde_json::json!({"id": 7})]).unwrap();
        let store = store_with(Arc::new(MemoryStorage::with_entry(STORAGE_KEY, raw)));
        assert_eq!(store.load(now()), 1);
    }

    #[test]
    fn test_remove() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.upsert(job("a", "k", now()));
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_update_existing_does_not_resurrect() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.upsert(job("a", "k", now()));
        store.remove("a");
        assert!(!store.update_existing(job("a", "k", now())));
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_find_reusable_rules() {
        let store = store_with(Arc::new(MemoryStorage::new()));

        let mut failed = job("failed", "k", now());
        set_status(&mut failed, JobStatus::Failed);
        store.upsert(failed);
        assert!(store.find_reusable("k", now()).is_none());

        let mut expired = job("expired", "k", now());
        set_status(&mut expired, JobStatus::Completed);
        expired.expires_at = now() - Duration::minutes(1);
        store.upsert(expired);
        assert!(store.find_reusable("k", now()).is_none());

        store.upsert(job("live", "k", now()));
        assert_eq!(store.find_reusable("k", now()).unwrap().id(), "live");
        assert!(store.find_reusable("other", now()).is_none());
    }

    #[test]
    fn test_in_flight() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.upsert(job("a", "k1", now()));
        let mut done = job("b", "k2", now());
        set_status(&mut done, JobStatus::Completed);
        store.upsert(done);

        let ids: Vec<_> = store.in_flight().into_iter().map(|j| j.job.id).collect();
        assert_eq!(ids, vec!["a".to_string()]);
    }
}
