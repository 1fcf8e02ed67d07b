// SQLite Maintenance Implementation

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use codesift_core::error::Result;
use codesift_core::port::{Clock, Maintenance, MaintenanceStats, QueueConfig};

use crate::map_sqlx_error;

pub struct SqliteMaintenance {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    queue_config: QueueConfig,
}

impl SqliteMaintenance {
    pub fn new(
        pool: SqlitePool,
        clock: Arc<dyn Clock>,
        queue_config: QueueConfig,
    ) -> Self {
        Self {
            pool,
            clock,
            queue_config,
        }
    }
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn evict_expired_cache(&self) -> Result<u64> {
        let now = self.clock.now_ms();
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn purge_expired_messages(&self) -> Result<u64> {
        let now = self.clock.now_ms();
        let main_cutoff = now - self.queue_config.retention_seconds * 1000;
        let dlq_cutoff = now - self.queue_config.dlq_retention_seconds * 1000;

        let main = sqlx::query(
            "DELETE FROM queue_messages WHERE queue = 'main' AND enqueued_at <= ?",
        )
        .bind(main_cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let dlq = sqlx::query(
            "DELETE FROM queue_messages WHERE queue = 'dlq' AND enqueued_at <= ?",
        )
        .bind(dlq_cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(main.rows_affected() + dlq.rows_affected())
    }

    async fn stats(&self) -> Result<MaintenanceStats> {
        let cache_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let queue_messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue_messages")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let job_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM review_jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(MaintenanceStats {
            cache_entries,
            cache_evicted: 0,
            queue_messages,
            queue_purged: 0,
            job_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use codesift_core::port::clock::mocks::ManualClock;

    #[tokio::test]
    async fn test_evicts_expired_cache_and_purges_old_messages() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let now = 10_000_000_000i64;
        let time = Arc::new(ManualClock::new(now));

        sqlx::query("INSERT INTO cache_entries (cache_key, report, expires_at) VALUES (?, ?, ?)")
            .bind("k1")
            .bind("{}")
            .bind(now - 1)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO cache_entries (cache_key, report, expires_at) VALUES (?, ?, ?)")
            .bind("k2")
            .bind("{}")
            .bind(now + 10_000)
            .execute(&pool)
            .await
            .unwrap();

        let old = now - 90_000_000; // ~25h, beyond main retention
        sqlx::query(
            "INSERT INTO queue_messages (message_id, queue, body, receive_count, visible_at, enqueued_at) VALUES (?, 'main', '{}', 0, ?, ?)",
        )
        .bind("m-old")
        .bind(old)
        .bind(old)
        .execute(&pool)
        .await
        .unwrap();

        let maintenance =
            SqliteMaintenance::new(pool, time, QueueConfig::default());

        assert_eq!(maintenance.evict_expired_cache().await.unwrap(), 1);
        assert_eq!(maintenance.purge_expired_messages().await.unwrap(), 1);

        let stats = maintenance.stats().await.unwrap();
        assert_eq!(stats.cache_entries, 1);
        assert_eq!(stats.queue_messages, 0);
    }
}
