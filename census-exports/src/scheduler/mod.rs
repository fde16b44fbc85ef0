//! Scheduler layer
//!
//! Keeps the status of in-flight export jobs fresh by polling the export
//! service, one task per job, until each job completes or fails.

pub mod poller;

pub use poller::{Poller, TickOutcome};
