//! Service layer
//!
//! The coordinator is the single entry point the rest of the application
//! uses to request, inspect and dismiss exports.

mod coordinator;

pub use coordinator::{ExportCoordinator, ExportOutcome};
