// SQLite DlqStore Implementation

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use codesift_core::domain::{DlqEntry, DlqStats};
use codesift_core::error::{AppError, Result};
use codesift_core::port::{Clock, DlqStore};

use crate::map_sqlx_error;

pub struct SqliteDlqStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteDlqStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
        }
    }
}

#[async_trait]
impl DlqStore for SqliteDlqStore {
    async fn record(&self, entry: &DlqEntry) -> Result<bool> {
        // Idempotent on message_id via the UNIQUE constraint.
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO dlq_messages (
                id, job_id, message_id, message_body, receive_count,
                last_error, moved_to_dlq_at, retry_count,
                resolved, resolved_at, resolution_reason
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.job_id)
        .bind(&entry.message_id)
        .bind(&entry.message_body)
        .bind(entry.receive_count)
        .bind(&entry.last_error)
        .bind(entry.moved_to_dlq_at)
        .bind(entry.retry_count)
        .bind(entry.resolved as i64)
        .bind(entry.resolved_at)
        .bind(&entry.resolution_reason)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: &str) -> Result<Option<DlqEntry>> {
        let row = sqlx::query_as::<_, DlqRow>("SELECT * FROM dlq_messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(DlqRow::into_entry))
    }

    async fn list(
        &self,
        resolved: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DlqEntry>> {
        let rows = match resolved {
            Some(flag) => {
                sqlx::query_as::<_, DlqRow>(
                    r#"
                    SELECT * FROM dlq_messages
                    WHERE resolved = ?
                    ORDER BY moved_to_dlq_at DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(flag as i64)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, DlqRow>(
                    r#"
                    SELECT * FROM dlq_messages
                    ORDER BY moved_to_dlq_at DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DlqRow::into_entry).collect())
    }

    async fn stats(&self) -> Result<DlqStats> {
        let row: (i64, i64, i64, Option<i64>, Option<f64>) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN resolved = 0 THEN 1 ELSE 0 END), 0),
                COUNT(DISTINCT job_id),
                MAX(moved_to_dlq_at),
                AVG(retry_count)
            FROM dlq_messages
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(DlqStats {
            total: row.0,
            unresolved: row.1,
            unique_jobs: row.2,
            latest_moved_at: row.3,
            avg_retry_count: row.4.unwrap_or(0.0),
        })
    }

    async fn resolve(&self, id: &str, reason: &str) -> Result<DlqEntry> {
        let now = self.clock.now_ms();
        // Repeated resolves keep the original timestamp.
        let result = sqlx::query(
            r#"
            UPDATE dlq_messages
            SET resolved = 1,
                resolved_at = COALESCE(resolved_at, ?),
                resolution_reason = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("dlq entry {} not found", id)));
        }
        self.get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("dlq entry {} not found", id)))
    }

    async fn increment_retry(&self, id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE dlq_messages SET retry_count = retry_count + 1 WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("dlq entry {} not found", id)));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DlqRow {
    id: String,
    job_id: String,
    message_id: String,
    message_body: String,
    receive_count: i64,
    last_error: Option<String>,
    moved_to_dlq_at: i64,
    retry_count: i64,
    resolved: i64,
    resolved_at: Option<i64>,
    resolution_reason: Option<String>,
}

impl DlqRow {
    fn into_entry(self) -> DlqEntry {
        DlqEntry {
            id: self.id,
            job_id: self.job_id,
            message_id: self.message_id,
            message_body: self.message_body,
            receive_count: self.receive_count,
            last_error: self.last_error,
            moved_to_dlq_at: self.moved_to_dlq_at,
            retry_count: self.retry_count,
            resolved: self.resolved != 0,
            resolved_at: self.resolved_at,
            resolution_reason: self.resolution_reason,
        }
    }
}
