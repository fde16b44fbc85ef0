//! Census Core
//!
//! Core types and abstractions for the Census export tracker.
//!
//! This crate contains:
//! - Domain types: export jobs, their status machine and filter snapshots
//! - DTOs: wire representations of the remote export service
//! - Job keys: deterministic deduplication keys and data-cycle arithmetic

pub mod domain;
pub mod dto;
pub mod job_key;
