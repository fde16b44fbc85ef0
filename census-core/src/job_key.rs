//! Job keys and data-cycle arithmetic
//!
//! The survey dataset is refreshed once a day at 03:00 local time. Two export
//! requests with the same type, scope and applied filters that fall into the
//! same refresh window target the same data snapshot and therefore share a
//! job key.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::export::{ExportScope, ExportType};
use crate::domain::filters::ExportFilters;

/// Local hour at which the remote dataset is refreshed
pub const DATA_REFRESH_HOUR: u32 = 3;

fn refresh_time() -> NaiveTime {
    NaiveTime::from_hms_opt(DATA_REFRESH_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Date of the data snapshot visible at `now` (local time)
pub fn data_cycle_date(now: NaiveDateTime) -> NaiveDate {
    let today = now.date();
    if now.time() < refresh_time() {
        today.pred_opt().unwrap_or(today)
    } else {
        today
    }
}

/// First refresh boundary strictly after `now` (local time)
pub fn next_refresh_boundary(now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date();
    if now.time() < refresh_time() {
        today.and_time(refresh_time())
    } else {
        today.succ_opt().unwrap_or(today).and_time(refresh_time())
    }
}

/// Canonical, storage-safe encoding of the applied filters
pub fn encode_filters(filters: &ExportFilters) -> String {
    // BTreeMap keeps keys sorted so insertion order never leaks into the key
    let canonical = serde_json::to_string(&filters.applied()).unwrap_or_else(|_| "{}".to_string());
    URL_SAFE_NO_PAD.encode(canonical.as_bytes())
}

/// Deduplication key: `{type}_{scope}_{dataCycleDate}_{encodedFilters}`
pub fn generate_job_key(
    export_type: ExportType,
    scope: ExportScope,
    filters: &ExportFilters,
    now: NaiveDateTime,
) -> String {
    format!(
        "{}_{}_{}_{}",
        export_type.as_str(),
        scope.as_str(),
        data_cycle_date(now).format("%Y-%m-%d"),
        encode_filters(filters)
    )
}

/// Suggested name for the downloaded artifact
pub fn default_file_name(export_type: ExportType, now: NaiveDateTime) -> String {
    format!(
        "{}_export_{}.csv",
        export_type.file_stem(),
        now.format("%Y-%m-%d")
    )
}
