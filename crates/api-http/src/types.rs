//! Request/response DTOs for the HTTP surface.

use serde::{Deserialize, Serialize};

use codesift_core::domain::{DlqEntry, Job, JobStatus, JobSummary, Report};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub file_name: String,
    #[serde(default)]
    pub file_content: String,
    pub owner: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: JobStatus,
    pub result: Option<Report>,
    pub cache_hit: bool,
    pub processing_time_ms: Option<i64>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<Job> for StatusResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            result: job.result,
            cache_hit: job.cache_hit,
            processing_time_ms: job.processing_time_ms,
            created_at: job.created_at,
            completed_at: job.completed_at,
            last_error: job.last_error,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub owner: i64,
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub file_name: String,
    pub status: JobStatus,
    pub cache_hit: bool,
    pub processing_time_ms: Option<i64>,
    pub created_at: i64,
    pub issues_found: u64,
}

impl From<JobSummary> for HistoryEntry {
    fn from(summary: JobSummary) -> Self {
        Self {
            id: summary.id,
            file_name: summary.file_name,
            status: summary.status,
            cache_hit: summary.cache_hit,
            processing_time_ms: summary.processing_time_ms,
            created_at: summary.created_at,
            issues_found: summary.issues_found,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DlqListQuery {
    pub resolved: Option<bool>,
    #[serde(default = "default_dlq_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_dlq_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct DlqEntryResponse {
    pub id: String,
    pub job_id: String,
    pub message_id: String,
    pub receive_count: i64,
    pub last_error: Option<String>,
    pub moved_to_dlq_at: i64,
    pub retry_count: i64,
    pub resolved: bool,
    pub resolved_at: Option<i64>,
    pub resolution_reason: Option<String>,
}

impl From<DlqEntry> for DlqEntryResponse {
    fn from(entry: DlqEntry) -> Self {
        Self {
            id: entry.id,
            job_id: entry.job_id,
            message_id: entry.message_id,
            receive_count: entry.receive_count,
            last_error: entry.last_error,
            moved_to_dlq_at: entry.moved_to_dlq_at,
            retry_count: entry.retry_count,
            resolved: entry.resolved,
            resolved_at: entry.resolved_at,
            resolution_reason: entry.resolution_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: i64,
    pub cache_hit_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub cache_hits: i64,
    pub cache_misses: i64,
    pub cache_hit_rate: f64,
    pub queue_depth: i64,
    pub active_workers: i64,
    pub total_jobs: i64,
    pub queued_jobs: i64,
    pub processing_jobs: i64,
    pub retrying_jobs: i64,
    pub complete_jobs: i64,
    pub dlq_jobs: i64,
}
