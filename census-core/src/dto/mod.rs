//! Data Transfer Objects for the remote export service
//!
//! These mirror the JSON bodies exchanged with the export endpoints. Domain
//! types never cross the wire directly.

pub mod export;
