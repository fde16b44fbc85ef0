//! Census Exports
//!
//! Client-side lifecycle manager for asynchronous CSV export jobs.
//!
//! Architecture:
//! - Configuration: settings from environment or defaults
//! - Repositories: HTTP communication with the export service and file downloads
//! - Store: persisted job records with retention-based garbage collection
//! - Scheduler: one polling task per in-flight job
//! - Service: the coordinator that deduplicates requests and wires it all together
//!
//! A request for a full-dataset export is turned into a job key. If a live job
//! with that key is already known it is reused; otherwise the service is asked
//! to create one and the job is polled until it completes or fails.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::ExportError;
pub use events::JobEvent;
pub use scheduler::Poller;
pub use service::{ExportCoordinator, ExportOutcome};
pub use store::{FileStorage, JobStore, MemoryStorage, StorageBackend};
