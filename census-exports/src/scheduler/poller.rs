//! Job status poller
//!
//! Each in-flight job gets its own task that fetches the job's status on a
//! fixed interval and merges it into the job store. The registry keyed by job
//! id is the only owner of those tasks, so starting twice never creates a
//! second timer and stopping an unknown job is a no-op.

use census_core::domain::export::{JobId, JobStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::events::JobEvent;
use crate::repository::ExportRepository;
use crate::store::JobStore;

/// Result of a single poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Status merged; the job is still in flight
    Updated(JobStatus),
    /// Status merged; the job reached a terminal state
    Terminal(JobStatus),
    /// The request failed; nothing was written and the next tick retries
    Retry,
    /// The job is no longer in the store
    Gone,
    /// The poller was stopped while the request was in flight
    Discarded,
}

impl TickOutcome {
    /// Whether polling should end after this outcome
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TickOutcome::Terminal(_) | TickOutcome::Gone | TickOutcome::Discarded
        )
    }
}

struct PollHandle {
    generation: u64,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

struct PollerInner {
    repository: Arc<dyn ExportRepository>,
    store: Arc<JobStore>,
    events: broadcast::Sender<JobEvent>,
    interval: Duration,
    handles: Mutex<HashMap<JobId, PollHandle>>,
    next_generation: AtomicU64,
}

/// Registry of per-job polling tasks
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

impl Poller {
    /// Creates a poller with no active tasks
    pub fn new(
        repository: Arc<dyn ExportRepository>,
        store: Arc<JobStore>,
        events: broadcast::Sender<JobEvent>,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                repository,
                store,
                events,
                interval,
                handles: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Starts polling a job. Returns `false` if it was already being polled.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, job_id: &str) -> bool {
        let mut handles = self.inner.lock_handles();

        if let Some(existing) = handles.get(job_id) {
            if !existing.task.is_finished() {
                debug!("Job {} is already being polled", job_id);
                return false;
            }
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(Self::run(
            Arc::clone(&self.inner),
            job_id.to_string(),
            generation,
            Arc::clone(&cancelled),
        ));

        handles.insert(
            job_id.to_string(),
            PollHandle {
                generation,
                cancelled,
                task,
            },
        );

        info!(
            "Started polling job {} (interval: {:?})",
            job_id, self.inner.interval
        );
        true
    }

    /// Stops polling a job. Returns `false` if it was not being polled.
    ///
    /// A request already in flight is not aborted on the wire, but its
    /// response is discarded.
    pub fn stop(&self, job_id: &str) -> bool {
        let handle = self.inner.lock_handles().remove(job_id);
        match handle {
            Some(handle) => {
                handle.cancelled.store(true, Ordering::SeqCst);
                handle.task.abort();
                debug!("Stopped polling job {}", job_id);
                true
            }
            None => false,
        }
    }

    /// Cancels every polling task
    pub fn stop_all(&self) -> usize {
        let drained: Vec<(JobId, PollHandle)> = self.inner.lock_handles().drain().collect();
        let count = drained.len();

        for (_, handle) in drained {
            handle.cancelled.store(true, Ordering::SeqCst);
            handle.task.abort();
        }

        if count > 0 {
            info!("Stopped {} poller(s)", count);
        }
        count
    }

    pub fn is_polling(&self, job_id: &str) -> bool {
        self.inner
            .lock_handles()
            .get(job_id)
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Number of running polling tasks
    pub fn active_count(&self) -> usize {
        self.inner
            .lock_handles()
            .values()
            .filter(|handle| !handle.task.is_finished())
            .count()
    }

    /// Runs one poll cycle for a job outside the timer.
    ///
    /// If the job turns out terminal or gone, its timer is stopped as well.
    pub async fn tick(&self, job_id: &str) -> TickOutcome {
        let outcome = self.inner.poll_once(job_id, None).await;
        if outcome.is_final() {
            self.stop(job_id);
        }
        outcome
    }

    /// Polling loop for one job
    async fn run(
        inner: Arc<PollerInner>,
        job_id: JobId,
        generation: u64,
        cancelled: Arc<AtomicBool>,
    ) {
        let mut ticker = time::interval_at(Instant::now() + inner.interval, inner.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if cancelled.load(Ordering::SeqCst) {
                break;
            }

            let outcome = inner.poll_once(&job_id, Some(cancelled.as_ref())).await;
            if outcome.is_final() {
                debug!("Polling of job {} finished: {:?}", job_id, outcome);
                break;
            }
        }

        inner.release(&job_id, generation);
    }
}

impl PollerInner {
    fn lock_handles(&self) -> MutexGuard<'_, HashMap<JobId, PollHandle>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drops the registry entry of a task that ended on its own, unless a
    /// newer task has replaced it
    fn release(&self, job_id: &str, generation: u64) {
        let mut handles = self.lock_handles();
        if handles
            .get(job_id)
            .is_some_and(|handle| handle.generation == generation)
        {
            handles.remove(job_id);
        }
    }

    async fn poll_once(&self, job_id: &str, cancelled: Option<&AtomicBool>) -> TickOutcome {
        debug!("Polling status of job {}", job_id);

        let update = match self.repository.fetch_status(job_id).await {
            Ok(update) => update,
            Err(e) => {
                warn!("Failed to poll job {}, will retry: {:#}", job_id, e);
                return TickOutcome::Retry;
            }
        };

        if cancelled.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            debug!("Discarding late status of stopped job {}", job_id);
            return TickOutcome::Discarded;
        }

        let Some(mut job) = self.store.get(job_id) else {
            debug!("Job {} no longer tracked", job_id);
            return TickOutcome::Gone;
        };

        let previous = (job.job.status, job.job.progress);
        job.job.apply_status(update);
        let status = job.job.status;
        let progress = job.job.progress;
        let download_url = job.job.download_url.clone();
        let error = job.job.error.clone();

        if !self.store.update_existing(job) {
            return TickOutcome::Gone;
        }

        match status {
            JobStatus::Completed => {
                info!("Export job {} completed", job_id);
                self.emit(JobEvent::Completed {
                    job_id: job_id.to_string(),
                    download_url: download_url.unwrap_or_default(),
                });
                TickOutcome::Terminal(status)
            }
            JobStatus::Failed => {
                let error = error.unwrap_or_default();
                warn!("Export job {} failed: {}", job_id, error);
                self.emit(JobEvent::Failed {
                    job_id: job_id.to_string(),
                    error,
                });
                TickOutcome::Terminal(status)
            }
            JobStatus::Pending | JobStatus::Processing => {
                if previous != (status, progress) {
                    self.emit(JobEvent::Progress {
                        job_id: job_id.to_string(),
                        status,
                        progress,
                    });
                }
                TickOutcome::Updated(status)
            }
        }
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
