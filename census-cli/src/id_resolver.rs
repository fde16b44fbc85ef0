//! ID resolver module
//!
//! Handles resolution of job id prefixes to full ids against the local job
//! list, so users can type a short unambiguous prefix instead of the whole id.

use anyhow::{Result, anyhow};
use census_core::domain::export::{EnhancedExportJob, JobId};

/// Resolve a job ID or prefix to a known job id
///
/// An exact match wins even if it is also a prefix of other ids.
///
/// # Errors
/// Returns an error if:
/// - No job matches the prefix
/// - Multiple jobs match the prefix (ambiguous)
pub fn resolve_job_id(jobs: &[EnhancedExportJob], id_or_prefix: &str) -> Result<JobId> {
    let input = id_or_prefix.trim();
    if input.is_empty() {
        return Err(anyhow!("Job ID cannot be empty"));
    }

    if let Some(job) = jobs.iter().find(|j| j.id() == input) {
        return Ok(job.job.id.clone());
    }

    let prefix = input.to_lowercase();
    let matches: Vec<_> = jobs
        .iter()
        .filter(|j| j.id().to_lowercase().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => Err(anyhow!("No job found with ID starting with '{}'", input)),
        1 => Ok(matches[0].job.id.clone()),
        _ => {
            let ids: Vec<&str> = matches.iter().map(|j| j.id()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                input,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_core::domain::export::{ExportJob, ExportScope};
    use census_core::domain::filters::ExportFilters;
    use chrono::Utc;

    fn jobs(ids: &[&str]) -> Vec<EnhancedExportJob> {
        ids.iter()
            .map(|id| EnhancedExportJob {
                job: ExportJob::pending(*id, Utc::now(), "children.csv".to_string()),
                job_key: "key".to_string(),
                scope: ExportScope::All,
                filters: ExportFilters::default(),
                expires_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_unique_prefix() {
        let jobs = jobs(&["a1b2c3", "d4e5f6"]);
        assert_eq!(resolve_job_id(&jobs, "a1").unwrap(), "a1b2c3");
        assert_eq!(resolve_job_id(&jobs, "D4").unwrap(), "d4e5f6");
    }

    #[test]
    fn test_exact_match_wins() {
        let jobs = jobs(&["abc", "abcdef"]);
        assert_eq!(resolve_job_id(&jobs, "abc").unwrap(), "abc");
    }

    #[test]
    fn test_ambiguous_prefix() {
        let jobs = jobs(&["abc1", "abc2"]);
        let err = resolve_job_id(&jobs, "abc").unwrap_err().to_string();
        assert!(err.contains("Ambiguous"));
        assert!(err.contains("abc1, abc2"));
    }

    #[test]
    fn test_no_match() {
        let jobs = jobs(&["abc1"]);
        assert!(resolve_job_id(&jobs, "zzz").is_err());
        assert!(resolve_job_id(&jobs, "  ").is_err());
    }
}
