//! Repository layer
//!
//! Repositories abstract communication with the outside world: the export
//! service's HTTP endpoints and the place finished files are written to. They
//! carry no lifecycle logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod downloads;
mod exports;

// Re-export traits
pub use downloads::DownloadHandler;
pub use exports::ExportRepository;

// Re-export implementations
pub use downloads::FileDownloader;
pub use exports::HttpExportRepository;
