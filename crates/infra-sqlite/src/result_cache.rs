// SQLite ResultCache Implementation
//
// The cache table lives in the shared database file, so the submission
// front-end and the workers observe the same state. Expiry is enforced on
// read; the maintenance pass deletes expired rows.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use codesift_core::domain::{Fingerprint, Report};
use codesift_core::error::Result;
use codesift_core::port::{CacheConfig, Clock, ResultCache};

use crate::map_sqlx_error;

pub struct SqliteResultCache {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl SqliteResultCache {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            pool,
            clock,
            config,
        }
    }

    fn key(&self, fp: &Fingerprint) -> String {
        format!("{}{}", self.config.key_prefix, fp.as_str())
    }
}

#[async_trait]
impl ResultCache for SqliteResultCache {
    async fn get(&self, fp: &Fingerprint) -> Result<Option<Report>> {
        let now = self.clock.now_ms();
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT report FROM cache_entries WHERE cache_key = ? AND expires_at > ?",
        )
        .bind(self.key(fp))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match raw {
            Some(raw) => {
                debug!(fingerprint = %fp, "Cache hit");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, fp: &Fingerprint, report: &Report) -> Result<()> {
        let now = self.clock.now_ms();
        let expires_at = now + self.config.ttl_seconds * 1000;
        let raw = serde_json::to_string(report)?;

        // Last-writer-wins is fine: writes for one fingerprint are
        // value-equivalent.
        sqlx::query(
            r#"
            INSERT INTO cache_entries (cache_key, report, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE
            SET report = excluded.report, expires_at = excluded.expires_at
            "#,
        )
        .bind(self.key(fp))
        .bind(raw)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
