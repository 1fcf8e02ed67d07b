// DLQ Store Port (Interface)

use crate::domain::{DlqEntry, DlqStats};
use crate::error::Result;
use async_trait::async_trait;

/// Durable store for dead-letter entries.
#[async_trait]
pub trait DlqStore: Send + Sync {
    /// Record an entry. Idempotent on `message_id`: returns `false` (and
    /// changes nothing) when the message was already recorded.
    async fn record(&self, entry: &DlqEntry) -> Result<bool>;

    async fn get(&self, id: &str) -> Result<Option<DlqEntry>>;

    /// List entries, newest first, optionally filtered by resolved flag.
    async fn list(&self, resolved: Option<bool>, limit: i64, offset: i64)
        -> Result<Vec<DlqEntry>>;

    async fn stats(&self) -> Result<DlqStats>;

    /// Mark resolved with a reason. Idempotent: repeated calls keep
    /// `resolved = true` and overwrite the reason with the same value.
    async fn resolve(&self, id: &str, reason: &str) -> Result<DlqEntry>;

    /// Bump the manual retry counter.
    async fn increment_retry(&self, id: &str) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::port::Clock;
    use std::sync::{Arc, Mutex};

    /// In-memory DLQ store with the same message-id idempotency as the
    /// durable implementation.
    pub struct InMemoryDlqStore {
        entries: Mutex<Vec<DlqEntry>>,
        clock: Arc<dyn Clock>,
    }

    impl InMemoryDlqStore {
        pub fn new(clock: Arc<dyn Clock>) -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
                clock,
            }
        }
    }

    #[async_trait]
    impl DlqStore for InMemoryDlqStore {
        async fn record(&self, entry: &DlqEntry) -> Result<bool> {
            let mut entries = self.entries.lock().unwrap();
            if entries.iter().any(|e| e.message_id == entry.message_id) {
                return Ok(false);
            }
            entries.push(entry.clone());
            Ok(true)
        }

        async fn get(&self, id: &str) -> Result<Option<DlqEntry>> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.id == id)
                .cloned())
        }

        async fn list(
            &self,
            resolved: Option<bool>,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<DlqEntry>> {
            let entries = self.entries.lock().unwrap();
            let mut rows: Vec<DlqEntry> = entries
                .iter()
                .filter(|e| resolved.map(|r| e.resolved == r).unwrap_or(true))
                .cloned()
                .collect();
            rows.sort_by_key(|e| std::cmp::Reverse(e.moved_to_dlq_at));
            Ok(rows
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        }

        async fn stats(&self) -> Result<DlqStats> {
            let entries = self.entries.lock().unwrap();
            let total = entries.len() as i64;
            let unresolved = entries.iter().filter(|e| !e.resolved).count() as i64;
            let mut jobs: Vec<&str> = entries.iter().map(|e| e.job_id.as_str()).collect();
            jobs.sort_unstable();
            jobs.dedup();
            let avg_retry_count = if total > 0 {
                entries.iter().map(|e| e.retry_count).sum::<i64>() as f64 / total as f64
            } else {
                0.0
            };
            Ok(DlqStats {
                total,
                unresolved,
                unique_jobs: jobs.len() as i64,
                latest_moved_at: entries.iter().map(|e| e.moved_to_dlq_at).max(),
                avg_retry_count,
            })
        }

        async fn resolve(&self, id: &str, reason: &str) -> Result<DlqEntry> {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| AppError::NotFound(format!("dlq entry {} not found", id)))?;
            if !entry.resolved {
                entry.resolved = true;
                entry.resolved_at = Some(self.clock.now_ms());
            }
            entry.resolution_reason = Some(reason.to_string());
            Ok(entry.clone())
        }

        async fn increment_retry(&self, id: &str) -> Result<()> {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| AppError::NotFound(format!("dlq entry {} not found", id)))?;
            entry.retry_count += 1;
            Ok(())
        }
    }
}
