//! Export filter snapshot
//!
//! The dashboard filters exports by block, gram panchayat, survey status and
//! a free-text search. The value `"all"` in any selector means "no filter".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Selector value meaning "filter not applied"
pub const ALL_SENTINEL: &str = "all";

/// Errors raised while building filters from loose input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Unknown filter '{0}' (expected block, gramPanchayat, status or search)")]
    UnknownKey(String),

    #[error("Filter must be written as key=value, got '{0}'")]
    Malformed(String),
}

/// Filters active when an export was requested
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gram_panchayat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ExportFilters {
    /// Builds filters from key/value pairs in any order.
    ///
    /// Later pairs override earlier ones for the same key.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut filters = Self::default();
        for (key, value) in pairs {
            let value = Some(value.into());
            match key.as_ref() {
                "block" => filters.block = value,
                "gramPanchayat" | "gram_panchayat" | "gram-panchayat" | "gp" => {
                    filters.gram_panchayat = value
                }
                "status" => filters.status = value,
                "search" => filters.search = value,
                other => return Err(FilterError::UnknownKey(other.to_string())),
            }
        }
        Ok(filters)
    }

    /// Parses a single `key=value` argument
    pub fn parse_pair(input: &str) -> Result<(String, String), FilterError> {
        match input.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(FilterError::Malformed(input.to_string())),
        }
    }

    /// Filters with `"all"`, empty values and blank searches removed
    pub fn normalized(&self) -> Self {
        Self {
            block: normalize_selector(&self.block),
            gram_panchayat: normalize_selector(&self.gram_panchayat),
            status: normalize_selector(&self.status),
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    /// Applied filters keyed by their wire name, in canonical order
    pub fn applied(&self) -> BTreeMap<&'static str, String> {
        let normalized = self.normalized();
        let mut applied = BTreeMap::new();
        if let Some(block) = normalized.block {
            applied.insert("block", block);
        }
        if let Some(gp) = normalized.gram_panchayat {
            applied.insert("gramPanchayat", gp);
        }
        if let Some(status) = normalized.status {
            applied.insert("status", status);
        }
        if let Some(search) = normalized.search {
            applied.insert("search", search);
        }
        applied
    }

    /// Query parameters for the export creation endpoint
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        self.applied().into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.applied().is_empty()
    }
}

fn normalize_selector(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.is_empty() && *v != ALL_SENTINEL)
        .map(str::to_string)
}
