//! Core domain types
//!
//! These types are shared between the HTTP client (which receives remote job
//! state) and the export tracker (which persists and polls jobs).

pub mod export;
pub mod filters;
