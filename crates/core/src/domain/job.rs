// Review Job Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::fingerprint::Fingerprint;
use crate::domain::report::Report;

/// Job ID (UUID v4, opaque to clients)
pub type JobId = String;

/// Owner identity (per-submission identity only; no tenant isolation)
pub type OwnerId = i64;

/// Job lifecycle state.
///
/// Created as `Queued` (or `Complete` on a cache hit); the worker moves it
/// `Processing` → `Complete` | `Retrying`; the DLQ handler moves it to `Dlq`.
/// `Complete` is terminal: a redelivered message must never regress it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Retrying,
    Complete,
    Dlq,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Retrying => "retrying",
            JobStatus::Complete => "complete",
            JobStatus::Dlq => "dlq",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "retrying" => Some(JobStatus::Retrying),
            "complete" => Some(JobStatus::Complete),
            "dlq" => Some(JobStatus::Dlq),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable review job record. The job store row is the single source of
/// truth for job state.
///
/// Invariants: `status == Complete` iff `result` and `completed_at` are set;
/// `status == Dlq` iff `dlq_message_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner: Option<OwnerId>,
    pub code_hash: Fingerprint,
    pub file_name: String,
    pub file_content: String,
    pub status: JobStatus,
    pub result: Option<Report>,
    pub cache_hit: bool,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub dlq_message_id: Option<String>,
    pub dlq_moved_at: Option<i64>,
    pub created_at: i64, // epoch ms
    pub completed_at: Option<i64>,
    pub processing_time_ms: Option<i64>,
}

impl Job {
    /// New job awaiting analysis (cache miss path).
    pub fn new_queued(
        id: impl Into<String>,
        created_at: i64,
        owner: Option<OwnerId>,
        code_hash: Fingerprint,
        file_name: impl Into<String>,
        file_content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner,
            code_hash,
            file_name: file_name.into(),
            file_content: file_content.into(),
            status: JobStatus::Queued,
            result: None,
            cache_hit: false,
            attempts: 0,
            last_error: None,
            dlq_message_id: None,
            dlq_moved_at: None,
            created_at,
            completed_at: None,
            processing_time_ms: None,
        }
    }

    /// Job satisfied synchronously from the result cache. Written before the
    /// submit call returns so that status polls observe a consistent view.
    pub fn new_cached(
        id: impl Into<String>,
        created_at: i64,
        owner: Option<OwnerId>,
        code_hash: Fingerprint,
        file_name: impl Into<String>,
        file_content: impl Into<String>,
        report: Report,
    ) -> Self {
        Self {
            id: id.into(),
            owner,
            code_hash,
            file_name: file_name.into(),
            file_content: file_content.into(),
            status: JobStatus::Complete,
            result: Some(report),
            cache_hit: true,
            attempts: 0,
            last_error: None,
            dlq_message_id: None,
            dlq_moved_at: None,
            created_at,
            completed_at: Some(created_at),
            processing_time_ms: Some(0),
        }
    }
}

/// Compact row for history listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub file_name: String,
    pub status: JobStatus,
    pub cache_hit: bool,
    pub processing_time_ms: Option<i64>,
    pub created_at: i64,
    pub issues_found: u64,
}

/// Per-status totals used for queue-depth estimation and the stats surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobCounts {
    pub total: i64,
    pub queued: i64,
    pub processing: i64,
    pub retrying: i64,
    pub complete: i64,
    pub dlq: i64,
    pub cache_hits: i64,
    pub cache_misses: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::{Grade, ReportMetrics};

    fn empty_report(file_name: &str) -> Report {
        Report {
            file_name: file_name.to_string(),
            security: vec![],
            performance: vec![],
            style: vec![],
            ai_suggestions: vec![],
            metrics: ReportMetrics {
                lines_analyzed: 1,
                issues_found: 0,
                processing_time_ms: 0,
                review_time_text: "0 ms".to_string(),
                cache_hit: false,
            },
            quality_score: 100.0,
            grade: Grade::A,
        }
    }

    #[test]
    fn queued_job_holds_invariants() {
        let job = Job::new_queued(
            "job-1",
            1_000,
            Some(7),
            Fingerprint::of_bytes(b"x"),
            "a.js",
            "x",
        );
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.result.is_none());
        assert!(job.completed_at.is_none());
        assert!(!job.cache_hit);
    }

    #[test]
    fn cached_job_is_complete_with_result() {
        let job = Job::new_cached(
            "job-2",
            2_000,
            None,
            Fingerprint::of_bytes(b"y"),
            "b.js",
            "y",
            empty_report("b.js"),
        );
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job.result.is_some());
        assert_eq!(job.completed_at, Some(2_000));
        assert_eq!(job.processing_time_ms, Some(0));
        assert!(job.cache_hit);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Dlq).unwrap(),
            "\"dlq\"".to_string()
        );
        assert_eq!(JobStatus::parse("retrying"), Some(JobStatus::Retrying));
        assert_eq!(JobStatus::parse("RUNNING"), None);
    }
}
