//! Common types used across CLI modules

use census_core::domain::export::{ExportScope, ExportType};
use clap::ValueEnum;

/// Dataset selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    /// Child survey records
    Children,
    /// Gram panchayat summaries
    GramPanchayats,
}

impl From<ExportKind> for ExportType {
    fn from(kind: ExportKind) -> Self {
        match kind {
            ExportKind::Children => ExportType::Children,
            ExportKind::GramPanchayats => ExportType::GramPanchayats,
        }
    }
}

/// Export scope selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    /// Only the rows already on screen; nothing is requested
    Current,
    /// The whole filtered dataset, produced by the service
    All,
}

impl From<ScopeArg> for ExportScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Current => ExportScope::Current,
            ScopeArg::All => ExportScope::All,
        }
    }
}
