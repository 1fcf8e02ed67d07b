// SQLite JobStore Implementation

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use codesift_core::domain::{
    Fingerprint, Job, JobCounts, JobId, JobStatus, JobSummary, OwnerId, Report,
};
use codesift_core::error::{AppError, Result};
use codesift_core::port::{Clock, JobStore};

use crate::map_sqlx_error;

pub struct SqliteJobStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
        }
    }

    /// Distinguish "no such row" from "row in a terminal state" after a
    /// conditional update touched nothing.
    async fn explain_no_update(&self, id: &JobId, target: &str) -> AppError {
        let status: std::result::Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM review_jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        match status {
            Ok(None) => AppError::NotFound(format!("job {} not found", id)),
            Ok(Some(current)) => AppError::InvalidState(format!(
                "cannot move job {} from {} to {}",
                id, current, target
            )),
            Err(e) => map_sqlx_error(e),
        }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create(&self, job: &Job) -> Result<()> {
        let result_json = match &job.result {
            Some(report) => Some(serde_json::to_string(report)?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO review_jobs (
                id, user_id, code_hash, file_name, file_content,
                status, result, cache_hit, attempts, last_error,
                dlq_message_id, dlq_moved_at,
                created_at, completed_at, processing_time_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(job.owner)
        .bind(job.code_hash.as_str())
        .bind(&job.file_name)
        .bind(&job.file_content)
        .bind(job.status.as_str())
        .bind(result_json)
        .bind(job.cache_hit as i64)
        .bind(job.attempts)
        .bind(&job.last_error)
        .bind(&job.dlq_message_id)
        .bind(job.dlq_moved_at)
        .bind(job.created_at)
        .bind(job.completed_at)
        .bind(job.processing_time_ms)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM review_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn mark_processing(&self, id: &JobId, attempts: i64) -> Result<()> {
        // Conditional update: a completed job must never regress.
        let result = sqlx::query(
            r#"
            UPDATE review_jobs
            SET status = 'processing', attempts = ?
            WHERE id = ? AND status != 'complete'
            "#,
        )
        .bind(attempts)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.explain_no_update(id, "processing").await);
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: &JobId,
        report: &Report,
        duration_ms: i64,
        attempts: i64,
    ) -> Result<()> {
        let result_json = serde_json::to_string(report)?;
        let now = self.clock.now_ms();

        // At-most-once completion: the guard makes the second writer lose.
        let result = sqlx::query(
            r#"
            UPDATE review_jobs
            SET status = 'complete', result = ?, completed_at = ?,
                processing_time_ms = ?, attempts = ?, last_error = NULL
            WHERE id = ? AND status != 'complete'
            "#,
        )
        .bind(result_json)
        .bind(now)
        .bind(duration_ms)
        .bind(attempts)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.explain_no_update(id, "complete").await);
        }
        Ok(())
    }

    async fn mark_retrying(&self, id: &JobId, attempts: i64, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE review_jobs
            SET status = 'retrying', attempts = ?, last_error = ?
            WHERE id = ? AND status != 'complete'
            "#,
        )
        .bind(attempts)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.explain_no_update(id, "retrying").await);
        }
        Ok(())
    }

    async fn mark_dlq(&self, id: &JobId, message_id: &str, error: &str) -> Result<()> {
        let now = self.clock.now_ms();
        let result = sqlx::query(
            r#"
            UPDATE review_jobs
            SET status = 'dlq', dlq_message_id = ?, dlq_moved_at = ?, last_error = ?
            WHERE id = ? AND status != 'complete'
            "#,
        )
        .bind(message_id)
        .bind(now)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.explain_no_update(id, "dlq").await);
        }
        Ok(())
    }

    async fn find_by_fingerprint(&self, fp: &Fingerprint) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM review_jobs WHERE code_hash = ? ORDER BY created_at ASC",
        )
        .bind(fp.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn history(&self, owner: OwnerId, limit: i64) -> Result<Vec<JobSummary>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM review_jobs
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(owner)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                let job = row.into_job()?;
                Ok(JobSummary {
                    issues_found: job.result.as_ref().map(|r| r.issue_count()).unwrap_or(0),
                    id: job.id,
                    file_name: job.file_name,
                    status: job.status,
                    cache_hit: job.cache_hit,
                    processing_time_ms: job.processing_time_ms,
                    created_at: job.created_at,
                })
            })
            .collect()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM review_jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count)
    }

    async fn counts(&self) -> Result<JobCounts> {
        let row: (i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'queued' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'retrying' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'complete' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'dlq' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN cache_hit = 1 THEN 1 ELSE 0 END), 0)
            FROM review_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(JobCounts {
            total: row.0,
            queued: row.1,
            processing: row.2,
            retrying: row.3,
            complete: row.4,
            dlq: row.5,
            cache_hits: row.6,
            cache_misses: row.0 - row.6,
        })
    }

    async fn ensure_owner(&self, owner: OwnerId) -> Result<()> {
        let now = self.clock.now_ms();
        sqlx::query("INSERT OR IGNORE INTO users (id, created_at) VALUES (?, ?)")
            .bind(owner)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    user_id: Option<i64>,
    code_hash: String,
    file_name: String,
    file_content: String,
    status: String,
    result: Option<String>,
    cache_hit: i64,
    attempts: i64,
    last_error: Option<String>,
    dlq_message_id: Option<String>,
    dlq_moved_at: Option<i64>,
    created_at: i64,
    completed_at: Option<i64>,
    processing_time_ms: Option<i64>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status = JobStatus::parse(&self.status).ok_or_else(|| {
            AppError::Database(format!("unknown job status '{}' in row", self.status))
        })?;
        let result: Option<Report> = match self.result {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };

        Ok(Job {
            id: self.id,
            owner: self.user_id,
            code_hash: Fingerprint::from_hex(self.code_hash),
            file_name: self.file_name,
            file_content: self.file_content,
            status,
            result,
            cache_hit: self.cache_hit != 0,
            attempts: self.attempts,
            last_error: self.last_error,
            dlq_message_id: self.dlq_message_id,
            dlq_moved_at: self.dlq_moved_at,
            created_at: self.created_at,
            completed_at: self.completed_at,
            processing_time_ms: self.processing_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use codesift_core::port::analyzer::mocks::MockAnalyzer;
    use codesift_core::port::clock::SystemClock;

    async fn setup() -> SqliteJobStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobStore::new(pool, Arc::new(SystemClock))
    }

    fn queued_job(id: &str, content: &str) -> Job {
        Job::new_queued(
            id,
            1_000,
            Some(7),
            Fingerprint::of_bytes(content.as_bytes()),
            "a.js",
            content,
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = setup().await;
        let job = queued_job("job-1", "let a = 1;");
        store.create(&job).await.unwrap();

        let found = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(found.id, job.id);
        assert_eq!(found.status, JobStatus::Queued);
        assert_eq!(found.code_hash, job.code_hash);
        assert!(found.result.is_none());
    }

    #[tokio::test]
    async fn test_complete_is_at_most_once() {
        let store = setup().await;
        store.create(&queued_job("job-1", "x")).await.unwrap();
        store.mark_processing(&"job-1".to_string(), 1).await.unwrap();

        let report = MockAnalyzer::empty_report("a.js");
        store
            .complete(&"job-1".to_string(), &report, 42, 1)
            .await
            .unwrap();

        // A second completion loses the conditional update.
        let err = store
            .complete(&"job-1".to_string(), &report, 99, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let job = store.get(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.processing_time_ms, Some(42));
        assert!(job.result.is_some());
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_completed_job_cannot_regress_to_processing() {
        let store = setup().await;
        store.create(&queued_job("job-1", "x")).await.unwrap();
        let report = MockAnalyzer::empty_report("a.js");
        store
            .complete(&"job-1".to_string(), &report, 5, 1)
            .await
            .unwrap();

        let err = store
            .mark_processing(&"job-1".to_string(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_mark_retrying_and_dlq() {
        let store = setup().await;
        store.create(&queued_job("job-1", "x")).await.unwrap();

        store
            .mark_retrying(&"job-1".to_string(), 2, "analysis failed")
            .await
            .unwrap();
        let job = store.get(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Retrying);
        assert_eq!(job.attempts, 2);
        assert_eq!(job.last_error.as_deref(), Some("analysis failed"));

        store
            .mark_dlq(&"job-1".to_string(), "msg-9", "retry budget exhausted")
            .await
            .unwrap();
        let job = store.get(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Dlq);
        assert_eq!(job.dlq_message_id.as_deref(), Some("msg-9"));
        assert!(job.dlq_moved_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let store = setup().await;
        let err = store.mark_processing(&"ghost".to_string(), 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_history_and_counts() {
        let store = setup().await;
        store.ensure_owner(7).await.unwrap();
        for i in 0..3 {
            let mut job = queued_job(&format!("job-{}", i), &format!("content {}", i));
            job.created_at = 1_000 + i as i64;
            store.create(&job).await.unwrap();
        }

        let history = store.history(7, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        // Newest first.
        assert_eq!(history[0].id, "job-2");

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.queued, 3);
        assert_eq!(counts.cache_misses, 3);

        assert_eq!(store.count_by_status(JobStatus::Queued).await.unwrap(), 3);
        assert_eq!(store.count_by_status(JobStatus::Complete).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_fingerprint() {
        let store = setup().await;
        let job_a = queued_job("job-a", "same content");
        let job_b = queued_job("job-b", "same content");
        store.create(&job_a).await.unwrap();
        store.create(&job_b).await.unwrap();

        let found = store.find_by_fingerprint(&job_a.code_hash).await.unwrap();
        assert_eq!(found.len(), 2);
    }
}
