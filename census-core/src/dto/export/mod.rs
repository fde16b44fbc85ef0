//! Export DTOs for communication with the export service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::export::{JobStatus, StatusUpdate};

/// Response to `POST /export/{resource}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportResponse {
    pub job_id: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// Status vocabulary of the export service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteJobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    /// Anything the service reports that this client does not know
    #[serde(other)]
    Unknown,
}

impl From<RemoteJobStatus> for JobStatus {
    fn from(status: RemoteJobStatus) -> Self {
        match status {
            RemoteJobStatus::Pending => JobStatus::Pending,
            RemoteJobStatus::InProgress => JobStatus::Processing,
            RemoteJobStatus::Completed => JobStatus::Completed,
            // Unrecognized values are treated as failures
            RemoteJobStatus::Failed | RemoteJobStatus::Unknown => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProgress {
    #[serde(default)]
    pub percentage: f64,
}

/// Response to `GET /export/jobs/{jobId}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobStatusResponse {
    pub status: RemoteJobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<RemoteProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::deserialize_option"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportJobStatusResponse {
    /// Maps the response into the client vocabulary
    pub fn into_update(self) -> StatusUpdate {
        StatusUpdate {
            status: self.status.into(),
            progress: self.progress.map(|p| p.percentage),
            download_url: self.download_url,
            error: self.error,
        }
    }
}

/// Service timestamps; values without an offset are read as UTC
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| {
                parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw)))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_mapping() {
        assert_eq!(JobStatus::from(RemoteJobStatus::Pending), JobStatus::Pending);
        assert_eq!(JobStatus::from(RemoteJobStatus::InProgress), JobStatus::Processing);
        assert_eq!(JobStatus::from(RemoteJobStatus::Completed), JobStatus::Completed);
        assert_eq!(JobStatus::from(RemoteJobStatus::Failed), JobStatus::Failed);
    }

    #[test]
    fn test_unknown_remote_status_maps_to_failed() {
        let response: ExportJobStatusResponse =
            serde_json::from_str(r#"{"status":"ARCHIVED"}"#).unwrap();
        assert_eq!(response.status, RemoteJobStatus::Unknown);
        assert_eq!(response.into_update().status, JobStatus::Failed);
    }

    #[test]
    fn test_status_response_parses_service_shape() {
        let json = r#"{
            "status": "IN_PROGRESS",
            "progress": { "percentage": 40 },
            "createdAt": "2024-01-15T10:00:00Z"
        }"#;
        let update = serde_json::from_str::<ExportJobStatusResponse>(json)
            .unwrap()
            .into_update();
        assert_eq!(update.status, JobStatus::Processing);
        assert_eq!(update.progress, Some(40.0));
        assert_eq!(update.download_url, None);
    }

    #[test]
    fn test_create_response_parses() {
        let json = r#"{"jobId":"abc","createdAt":"2024-01-15T10:00:00Z"}"#;
        let response: CreateExportResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.job_id, "abc");
    }

    #[test]
    fn test_create_response_accepts_timestamp_without_offset() {
        let json = r#"{"jobId":"abc","createdAt":"2024-01-15T10:00:00"}"#;
        let response: CreateExportResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.created_at,
            "2024-01-15T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );

        let json = r#"{"jobId":"abc","createdAt":"2024-01-15T10:00:00.250"}"#;
        assert!(serde_json::from_str::<CreateExportResponse>(json).is_ok());
    }

    #[test]
    fn test_offset_timestamps_are_normalized_to_utc() {
        let json = r#"{"jobId":"abc","createdAt":"2024-01-15T15:30:00+05:30"}"#;
        let response: CreateExportResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.created_at,
            "2024-01-15T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_status_response_timestamp_is_optional_and_lenient() {
        let response: ExportJobStatusResponse =
            serde_json::from_str(r#"{"status":"PENDING"}"#).unwrap();
        assert!(response.created_at.is_none());

        let response: ExportJobStatusResponse =
            serde_json::from_str(r#"{"status":"PENDING","createdAt":"2024-01-15T10:00:00"}"#)
                .unwrap();
        assert!(response.created_at.is_some());

        assert!(
            serde_json::from_str::<CreateExportResponse>(r#"{"jobId":"a","createdAt":"soon"}"#)
                .is_err()
        );
    }
}
