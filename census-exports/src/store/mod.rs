//! Persistence layer
//!
//! Job records live in a key/value medium so they survive restarts. The job
//! store keeps an in-memory copy and writes through on every mutation.

mod job_store;
mod storage;

pub use job_store::{JobStore, STORAGE_KEY};
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
