//! Export coordinator
//!
//! Decides, for every export request, whether to start a new job, attach to
//! one already in flight, or hand back a finished file, and keeps pollers in
//! step with the job store.

use anyhow::Context as _;
use census_client::CensusClient;
use census_core::domain::export::{
    EnhancedExportJob, ExportJob, ExportScope, ExportType, JobStatus,
};
use census_core::domain::filters::ExportFilters;
use census_core::job_key::{default_file_name, generate_job_key, next_refresh_boundary};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock, local_to_utc};
use crate::config::Config;
use crate::error::ExportError;
use crate::events::{EVENT_CAPACITY, JobEvent};
use crate::repository::{DownloadHandler, ExportRepository, FileDownloader, HttpExportRepository};
use crate::scheduler::Poller;
use crate::store::{FileStorage, JobStore};

/// How an export request was satisfied
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// Current-page export; the caller formats its loaded rows itself
    Local,
    /// A new job was started on the service
    Created(EnhancedExportJob),
    /// A finished job with the same key was downloaded again
    ReusedCompleted {
        job: EnhancedExportJob,
        saved_to: PathBuf,
    },
    /// A job with the same key is already running
    AttachedInFlight(EnhancedExportJob),
}

impl ExportOutcome {
    /// Whether the caller should acknowledge a newly started export
    pub fn is_new(&self) -> bool {
        matches!(self, ExportOutcome::Created(_))
    }

    pub fn job(&self) -> Option<&EnhancedExportJob> {
        match self {
            ExportOutcome::Local => None,
            ExportOutcome::Created(job)
            | ExportOutcome::ReusedCompleted { job, .. }
            | ExportOutcome::AttachedInFlight(job) => Some(job),
        }
    }
}

/// Entry point for requesting, listing and dismissing exports
pub struct ExportCoordinator {
    repository: Arc<dyn ExportRepository>,
    downloader: Arc<dyn DownloadHandler>,
    store: Arc<JobStore>,
    poller: Poller,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<JobEvent>,
    /// Serializes requests so two identical ones cannot both create a job
    requests: Mutex<()>,
}

impl ExportCoordinator {
    pub fn new(
        repository: Arc<dyn ExportRepository>,
        downloader: Arc<dyn DownloadHandler>,
        store: Arc<JobStore>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let poller = Poller::new(
            Arc::clone(&repository),
            Arc::clone(&store),
            events.clone(),
            poll_interval,
        );

        Self {
            repository,
            downloader,
            store,
            poller,
            clock,
            events,
            requests: Mutex::new(()),
        }
    }

    /// Wires HTTP repositories, file storage and the system clock from config
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        let mut client = CensusClient::new(config.api_url.clone());
        if let Some(token) = &config.api_token {
            client = client.with_token(token.clone());
        }
        let client = Arc::new(client);

        let retention =
            chrono::Duration::from_std(config.retention).context("retention is out of range")?;
        let store = Arc::new(JobStore::new(
            Arc::new(FileStorage::new(config.state_dir.clone())),
            retention,
        ));

        Ok(Self::new(
            Arc::new(HttpExportRepository::new(Arc::clone(&client))),
            Arc::new(FileDownloader::new(client, config.download_dir.clone())),
            store,
            Arc::new(SystemClock),
            config.poll_interval,
        ))
    }

    /// Loads persisted jobs and resumes polling of those still in flight.
    ///
    /// Returns the number of resumed pollers. Must be called from within a
    /// Tokio runtime.
    pub fn init(&self) -> usize {
        let loaded = self.store.load(self.clock.now().with_timezone(&Utc));

        let mut resumed = 0;
        for job in self.store.in_flight() {
            if self.poller.start(job.id()) {
                resumed += 1;
            }
        }

        info!(
            "Export tracker ready: {} job(s) known, {} resumed",
            loaded, resumed
        );
        resumed
    }

    /// Cancels all pollers
    pub fn shutdown(&self) -> usize {
        self.poller.stop_all()
    }

    /// Requests an export of the given type, scope and filters
    ///
    /// Full-dataset requests are deduplicated by job key: a finished job is
    /// downloaded again, a running job is attached to, and only otherwise is a
    /// new job started.
    pub async fn request_export(
        &self,
        export_type: ExportType,
        scope: ExportScope,
        filters: &ExportFilters,
    ) -> Result<ExportOutcome, ExportError> {
        if scope == ExportScope::Current {
            debug!("Current-page {} export handled locally", export_type);
            return Ok(ExportOutcome::Local);
        }

        let guard = self.requests.lock().await;

        let now = self.clock.now();
        let local = now.naive_local();
        let job_key = generate_job_key(export_type, scope, filters, local);

        if let Some(existing) = self.store.find_reusable(&job_key, now.with_timezone(&Utc)) {
            match (existing.status(), existing.job.download_url.clone()) {
                (JobStatus::Completed, Some(url)) => {
                    // Nothing is created from here on
                    drop(guard);
                    info!("Reusing completed export job {}", existing.id());
                    let saved_to = self
                        .downloader
                        .download(&url, &existing.job.file_name)
                        .await
                        .map_err(ExportError::DownloadFailed)?;
                    return Ok(ExportOutcome::ReusedCompleted {
                        job: existing,
                        saved_to,
                    });
                }
                (status, _) if status.is_in_flight() => {
                    info!("Export job {} already {}", existing.id(), status);
                    self.poller.start(existing.id());
                    return Ok(ExportOutcome::AttachedInFlight(existing));
                }
                _ => {}
            }
        }

        let created = self
            .repository
            .create_export(export_type, filters)
            .await
            .map_err(ExportError::CreateFailed)?;

        let job = EnhancedExportJob {
            job: ExportJob::pending(
                created.job_id,
                created.created_at,
                default_file_name(export_type, local),
            ),
            job_key,
            scope,
            filters: filters.normalized(),
            expires_at: local_to_utc(next_refresh_boundary(local)),
        };

        self.store.upsert(job.clone());
        self.poller.start(job.id());

        info!("Started export job {} ({})", job.id(), export_type);
        let _ = self.events.send(JobEvent::Started {
            job_id: job.job.id.clone(),
            file_name: job.job.file_name.clone(),
        });

        Ok(ExportOutcome::Created(job))
    }

    /// Removes a job, cancelling it on the service if it has not completed
    pub async fn dismiss(&self, job_id: &str) -> Result<(), ExportError> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| ExportError::NotFound(job_id.to_string()))?;

        if job.status() != JobStatus::Completed {
            if let Err(e) = self.repository.cancel_export(job_id).await {
                warn!("Could not cancel job {} on the service: {:#}", job_id, e);
            }
        }

        // Stop before removing so no further tick can touch the job
        self.poller.stop(job_id);
        self.store.remove(job_id);

        info!("Dismissed export job {}", job_id);
        let _ = self.events.send(JobEvent::Dismissed {
            job_id: job_id.to_string(),
        });
        Ok(())
    }

    /// Downloads the file of a completed job
    pub async fn download(&self, job_id: &str) -> Result<PathBuf, ExportError> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| ExportError::NotFound(job_id.to_string()))?;

        let Some(url) = job.job.download_url.as_deref() else {
            return Err(ExportError::NotCompleted {
                id: job.job.id.clone(),
                status: job.status(),
            });
        };

        self.downloader
            .download(url, &job.job.file_name)
            .await
            .map_err(ExportError::DownloadFailed)
    }

    /// Known jobs, newest first
    pub fn jobs(&self) -> Vec<EnhancedExportJob> {
        let mut jobs = self.store.list();
        jobs.sort_by(|a, b| b.job.created_at.cmp(&a.job.created_at));
        jobs
    }

    pub fn job(&self, job_id: &str) -> Option<EnhancedExportJob> {
        self.store.get(job_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }
}

impl Drop for ExportCoordinator {
    fn drop(&mut self) {
        self.poller.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scheduler::TickOutcome;
    use crate::store::MemoryStorage;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use census_client::CreateExportResponse;
    use census_core::domain::export::StatusUpdate;
    use chrono::{DateTime, NaiveDateTime};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeRepository {
        creates: AtomicUsize,
        fetches: AtomicUsize,
        /// When set, status fetches wait for `release` before answering
        hold_fetches: AtomicBool,
        release: Notify,
        fail_create: AtomicBool,
        fail_cancel: AtomicBool,
        cancelled: StdMutex<Vec<String>>,
        statuses: StdMutex<VecDeque<StatusUpdate>>,
    }

    impl FakeRepository {
        fn creates(&self) -> usize {
            self.creates.load(Ordering::SeqCst)
        }

        fn cancelled(&self) -> Vec<String> {
            self.cancelled.lock().unwrap().clone()
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn push_status(&self, update: StatusUpdate) {
            self.statuses.lock().unwrap().push_back(update);
        }
    }

    #[async_trait]
    impl ExportRepository for FakeRepository {
        async fn create_export(
            &self,
            _export_type: ExportType,
            _filters: &ExportFilters,
        ) -> Result<CreateExportResponse> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(anyhow!("API error (status 503): unavailable"));
            }
            let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CreateExportResponse {
                job_id: format!("job-{}", n),
                created_at: "2024-01-15T10:00:00Z".parse().unwrap(),
            })
        }

        async fn fetch_status(&self, _job_id: &str) -> Result<StatusUpdate> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.hold_fetches.load(Ordering::SeqCst) {
                self.release.notified().await;
            }
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted status"))
        }

        async fn cancel_export(&self, job_id: &str) -> Result<()> {
            self.cancelled.lock().unwrap().push(job_id.to_string());
            if self.fail_cancel.load(Ordering::SeqCst) {
                return Err(anyhow!("connection refused"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDownloader {
        urls: StdMutex<Vec<String>>,
        hold: AtomicBool,
        release: Notify,
    }

    impl RecordingDownloader {
        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DownloadHandler for RecordingDownloader {
        async fn download(&self, url: &str, file_name: &str) -> Result<PathBuf> {
            self.urls.lock().unwrap().push(url.to_string());
            if self.hold.load(Ordering::SeqCst) {
                self.release.notified().await;
            }
            Ok(PathBuf::from("/downloads").join(file_name))
        }
    }

    struct Harness {
        coordinator: ExportCoordinator,
        repository: Arc<FakeRepository>,
        downloader: Arc<RecordingDownloader>,
        clock: Arc<ManualClock>,
    }

    fn local(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn harness_with(storage: Arc<MemoryStorage>) -> Harness {
        let repository = Arc::new(FakeRepository::default());
        let downloader = Arc::new(RecordingDownloader::default());
        let clock = Arc::new(ManualClock::at_local(local("2024-01-15 10:00")));
        let store = Arc::new(JobStore::new(storage, chrono::Duration::days(7)));
        let coordinator = ExportCoordinator::new(
            repository.clone(),
            downloader.clone(),
            store,
            clock.clone(),
            Duration::from_secs(5),
        );
        Harness {
            coordinator,
            repository,
            downloader,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(MemoryStorage::new()))
    }

    fn no_filters() -> ExportFilters {
        ExportFilters::from_pairs([("block", "all"), ("search", "")]).unwrap()
    }

    fn now_utc(h: &Harness) -> DateTime<Utc> {
        h.clock.now().with_timezone(&Utc)
    }

    /// Stores a job whose key matches a children/all request made now
    fn seed(h: &Harness, id: &str, update: Option<StatusUpdate>) -> EnhancedExportJob {
        let key = generate_job_key(
            ExportType::Children,
            ExportScope::All,
            &no_filters(),
            h.clock.now().naive_local(),
        );
        let mut job = EnhancedExportJob {
            job: ExportJob::pending(id, now_utc(h), "children_export_2024-01-15.csv".to_string()),
            job_key: key,
            scope: ExportScope::All,
            filters: ExportFilters::default(),
            expires_at: now_utc(h) + chrono::Duration::hours(17),
        };
        if let Some(update) = update {
            job.job.apply_status(update);
        }
        h.coordinator.store().upsert(job.clone());
        job
    }

    fn update(status: JobStatus, progress: Option<f64>, url: Option<&str>) -> StatusUpdate {
        StatusUpdate {
            status,
            progress,
            download_url: url.map(str::to_string),
            error: None,
        }
    }

    async fn request(h: &Harness) -> Result<ExportOutcome, ExportError> {
        h.coordinator
            .request_export(ExportType::Children, ExportScope::All, &no_filters())
            .await
    }

    #[tokio::test]
    async fn test_current_scope_bypasses_jobs() {
        let h = harness();
        let outcome = h
            .coordinator
            .request_export(ExportType::Children, ExportScope::Current, &no_filters())
            .await
            .unwrap();

        assert_eq!(outcome, ExportOutcome::Local);
        assert_eq!(h.repository.creates(), 0);
        assert!(h.coordinator.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_completed_job_is_downloaded_again() {
        let h = harness();
        seed(
            &h,
            "done",
            Some(update(JobStatus::Completed, None, Some("https://x/file.csv"))),
        );
        let mut events = h.coordinator.subscribe();

        let outcome = request(&h).await.unwrap();

        assert!(matches!(outcome, ExportOutcome::ReusedCompleted { .. }));
        assert!(!outcome.is_new());
        assert_eq!(h.downloader.urls(), vec!["https://x/file.csv".to_string()]);
        assert_eq!(h.repository.creates(), 0);
        assert_eq!(h.coordinator.poller().active_count(), 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_in_flight_job_is_attached_once() {
        let h = harness();
        seed(&h, "running", Some(update(JobStatus::Processing, Some(20.0), None)));

        let first = request(&h).await.unwrap();
        let second = request(&h).await.unwrap();

        assert!(matches!(first, ExportOutcome::AttachedInFlight(ref job) if job.id() == "running"));
        assert!(matches!(second, ExportOutcome::AttachedInFlight(_)));
        assert_eq!(h.repository.creates(), 0);
        assert!(h.coordinator.poller().is_polling("running"));
        assert_eq!(h.coordinator.poller().active_count(), 1);

        h.coordinator.shutdown();
    }

    #[tokio::test]
    async fn test_failed_job_is_not_reused() {
        let h = harness();
        seed(&h, "broken", Some(update(JobStatus::Failed, None, None)));

        let outcome = request(&h).await.unwrap();

        assert!(outcome.is_new());
        assert_eq!(h.repository.creates(), 1);
        assert_eq!(h.coordinator.jobs().len(), 2);

        h.coordinator.shutdown();
    }

    #[tokio::test]
    async fn test_expired_job_is_not_reused() {
        let h = harness();
        let mut job = seed(
            &h,
            "stale",
            Some(update(JobStatus::Completed, None, Some("https://x/old.csv"))),
        );
        job.expires_at = now_utc(&h) - chrono::Duration::minutes(1);
        h.coordinator.store().upsert(job);

        let outcome = request(&h).await.unwrap();

        assert!(outcome.is_new());
        assert_eq!(h.repository.creates(), 1);
        assert!(h.downloader.urls().is_empty());

        h.coordinator.shutdown();
    }

    #[tokio::test]
    async fn test_created_job_expires_at_next_refresh() {
        let h = harness();
        let mut events = h.coordinator.subscribe();

        let ExportOutcome::Created(job) = request(&h).await.unwrap() else {
            panic!("expected a new job");
        };

        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.job.file_name, "children_export_2024-01-15.csv");
        assert_eq!(job.expires_at, local_to_utc(local("2024-01-16 03:00")));
        assert!(h.coordinator.poller().is_polling(job.id()));
        assert_eq!(
            events.try_recv().unwrap(),
            JobEvent::Started {
                job_id: "job-1".to_string(),
                file_name: "children_export_2024-01-15.csv".to_string(),
            }
        );

        h.coordinator.shutdown();
    }

    #[tokio::test]
    async fn test_early_morning_request_expires_same_day() {
        let h = harness();
        h.clock.set(crate::clock::local_from_naive(local("2024-01-16 01:30")));

        let outcome = request(&h).await.unwrap();
        let job = outcome.job().unwrap();
        assert_eq!(job.expires_at, local_to_utc(local("2024-01-16 03:00")));

        h.coordinator.shutdown();
    }

    #[tokio::test]
    async fn test_creation_failure_stores_nothing() {
        let h = harness();
        h.repository.fail_create.store(true, Ordering::SeqCst);

        let err = request(&h).await.unwrap_err();

        assert!(matches!(err, ExportError::CreateFailed(_)));
        assert!(err.to_string().contains("503"));
        assert!(h.coordinator.jobs().is_empty());
        assert_eq!(h.coordinator.poller().active_count(), 0);
    }

    #[tokio::test]
    async fn test_dismiss_in_flight_cancels_on_service() {
        let h = harness();
        let outcome = request(&h).await.unwrap();
        let id = outcome.job().unwrap().job.id.clone();
        let mut events = h.coordinator.subscribe();

        h.coordinator.dismiss(&id).await.unwrap();

        assert_eq!(h.repository.cancelled(), vec![id.clone()]);
        assert!(!h.coordinator.poller().is_polling(&id));
        assert!(h.coordinator.job(&id).is_none());
        assert_eq!(events.try_recv().unwrap(), JobEvent::Dismissed { job_id: id });
    }

    #[tokio::test]
    async fn test_dismiss_completed_skips_cancel() {
        let h = harness();
        seed(
            &h,
            "done",
            Some(update(JobStatus::Completed, None, Some("https://x/file.csv"))),
        );

        h.coordinator.dismiss("done").await.unwrap();

        assert!(h.repository.cancelled().is_empty());
        assert!(h.coordinator.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_dismiss_survives_cancel_failure() {
        let h = harness();
        seed(&h, "running", None);
        h.repository.fail_cancel.store(true, Ordering::SeqCst);

        h.coordinator.dismiss("running").await.unwrap();

        assert_eq!(h.repository.cancelled(), vec!["running".to_string()]);
        assert!(h.coordinator.job("running").is_none());
    }

    #[tokio::test]
    async fn test_dismiss_unknown_job() {
        let h = harness();
        assert!(matches!(
            h.coordinator.dismiss("nope").await,
            Err(ExportError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_download_requires_completion() {
        let h = harness();
        seed(&h, "running", None);

        assert!(matches!(
            h.coordinator.download("running").await,
            Err(ExportError::NotCompleted {
                status: JobStatus::Pending,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_init_collects_garbage_and_resumes_pollers() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let h = harness_with(storage.clone());
            seed(&h, "fresh", Some(update(JobStatus::Processing, Some(5.0), None)));
            let mut old = seed(&h, "old", None);
            old.job.created_at = now_utc(&h) - chrono::Duration::days(8);
            h.coordinator.store().upsert(old);
            seed(
                &h,
                "done",
                Some(update(JobStatus::Completed, None, Some("https://x/file.csv"))),
            );
        }

        let h = harness_with(storage);
        assert_eq!(h.coordinator.init(), 1);

        let ids: Vec<_> = h.coordinator.jobs().into_iter().map(|j| j.job.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&"old".to_string()));
        assert!(h.coordinator.poller().is_polling("fresh"));
        assert!(!h.coordinator.poller().is_polling("done"));

        assert_eq!(h.coordinator.shutdown(), 1);
        assert_eq!(h.coordinator.poller().active_count(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_export_lifecycle() {
        let h = harness();

        let outcome = request(&h).await.unwrap();
        assert!(outcome.is_new());
        assert_eq!(h.repository.creates(), 1);

        let jobs = h.coordinator.jobs();
        assert_eq!(jobs.len(), 1);
        let id = jobs[0].job.id.clone();
        assert_eq!(jobs[0].status(), JobStatus::Pending);

        h.repository
            .push_status(update(JobStatus::Processing, Some(40.0), None));
        assert_eq!(
            h.coordinator.poller().tick(&id).await,
            TickOutcome::Updated(JobStatus::Processing)
        );
        let job = h.coordinator.job(&id).unwrap();
        assert_eq!(job.status(), JobStatus::Processing);
        assert_eq!(job.job.progress, Some(40));

        h.repository
            .push_status(update(JobStatus::Completed, None, Some("https://x/file.csv")));
        assert_eq!(
            h.coordinator.poller().tick(&id).await,
            TickOutcome::Terminal(JobStatus::Completed)
        );
        let job = h.coordinator.job(&id).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.job.download_url.as_deref(), Some("https://x/file.csv"));
        assert!(!h.coordinator.poller().is_polling(&id));

        h.clock.advance(chrono::Duration::hours(2));
        let again = request(&h).await.unwrap();
        assert!(matches!(again, ExportOutcome::ReusedCompleted { .. }));
        assert_eq!(h.downloader.urls(), vec!["https://x/file.csv".to_string()]);
        assert_eq!(h.repository.creates(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_coordinator_stops_polling() {
        let Harness {
            coordinator,
            repository,
            ..
        } = harness();

        coordinator
            .request_export(ExportType::Children, ExportScope::All, &no_filters())
            .await
            .unwrap();
        let poller = coordinator.poller().clone();
        assert_eq!(poller.active_count(), 1);

        drop(coordinator);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(repository.fetches(), 0);
        assert_eq!(poller.active_count(), 0);
    }

    #[tokio::test]
    async fn test_status_arriving_after_dismiss_is_discarded() {
        let h = harness();
        let id = request(&h).await.unwrap().job().unwrap().job.id.clone();
        h.repository.hold_fetches.store(true, Ordering::SeqCst);
        h.repository
            .push_status(update(JobStatus::Completed, None, Some("https://x/file.csv")));
        let mut events = h.coordinator.subscribe();

        let poller = h.coordinator.poller().clone();
        let tick = tokio::spawn({
            let id = id.clone();
            async move { poller.tick(&id).await }
        });
        while h.repository.fetches() == 0 {
            tokio::task::yield_now().await;
        }

        h.coordinator.dismiss(&id).await.unwrap();
        h.repository.release.notify_one();

        assert_eq!(tick.await.unwrap(), TickOutcome::Gone);
        assert!(h.coordinator.job(&id).is_none());
        assert_eq!(
            events.try_recv().unwrap(),
            JobEvent::Dismissed { job_id: id }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fetch_in_flight_during_dismiss_is_dropped() {
        let h = harness();
        let id = request(&h).await.unwrap().job().unwrap().job.id.clone();
        h.repository.hold_fetches.store(true, Ordering::SeqCst);
        h.repository
            .push_status(update(JobStatus::Processing, Some(50.0), None));
        let mut events = h.coordinator.subscribe();

        // First tick fires at 5s and waits on the held fetch
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.repository.fetches(), 1);

        h.coordinator.dismiss(&id).await.unwrap();
        h.repository.release.notify_one();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(h.repository.fetches(), 1);
        assert!(h.coordinator.job(&id).is_none());
        assert!(!h.coordinator.poller().is_polling(&id));
        assert_eq!(
            events.try_recv().unwrap(),
            JobEvent::Dismissed { job_id: id }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reuse_download_does_not_block_other_requests() {
        let h = harness();
        seed(
            &h,
            "done",
            Some(update(JobStatus::Completed, None, Some("https://x/file.csv"))),
        );
        h.downloader.hold.store(true, Ordering::SeqCst);

        let (reused, other) = tokio::join!(request(&h), async {
            while h.downloader.urls().is_empty() {
                tokio::task::yield_now().await;
            }
            let other = tokio::time::timeout(
                Duration::from_secs(1),
                h.coordinator.request_export(
                    ExportType::GramPanchayats,
                    ExportScope::All,
                    &no_filters(),
                ),
            )
            .await;
            h.downloader.release.notify_one();
            other
        });

        assert!(matches!(reused.unwrap(), ExportOutcome::ReusedCompleted { .. }));
        assert!(other.expect("request waited for the download").unwrap().is_new());
        assert_eq!(h.repository.creates(), 1);

        h.coordinator.shutdown();
    }
}
