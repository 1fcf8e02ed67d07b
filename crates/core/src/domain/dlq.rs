// Dead-Letter Entry Domain Model

use serde::{Deserialize, Serialize};

/// Durable record of a message that exhausted its retry budget.
///
/// `message_id` is unique: recording the same transport message twice is a
/// no-op, which makes the worker's terminal-failure path and the DLQ
/// handler's consume path safely overlapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub id: String,
    pub job_id: String,
    pub message_id: String,
    /// Verbatim message body, kept unparsed for inspection and requeue.
    pub message_body: String,
    pub receive_count: i64,
    pub last_error: Option<String>,
    pub moved_to_dlq_at: i64,
    /// Manual requeues issued through the DLQ surface.
    pub retry_count: i64,
    pub resolved: bool,
    pub resolved_at: Option<i64>,
    pub resolution_reason: Option<String>,
}

impl DlqEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        job_id: impl Into<String>,
        message_id: impl Into<String>,
        message_body: impl Into<String>,
        receive_count: i64,
        last_error: Option<String>,
        moved_to_dlq_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            job_id: job_id.into(),
            message_id: message_id.into(),
            message_body: message_body.into(),
            receive_count,
            last_error,
            moved_to_dlq_at,
            retry_count: 0,
            resolved: false,
            resolved_at: None,
            resolution_reason: None,
        }
    }
}

/// Aggregates for the DLQ operational surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DlqStats {
    pub total: i64,
    pub unresolved: i64,
    pub unique_jobs: i64,
    pub latest_moved_at: Option<i64>,
    pub avg_retry_count: f64,
}
