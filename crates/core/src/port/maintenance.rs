// Storage Maintenance Port

use crate::error::Result;
use async_trait::async_trait;

/// Maintenance pass statistics
#[derive(Debug, Clone, Default)]
pub struct MaintenanceStats {
    pub cache_entries: i64,
    pub cache_evicted: u64,
    pub queue_messages: i64,
    pub queue_purged: u64,
    pub job_count: i64,
}

/// Background housekeeping over the shared storage: TTL eviction for the
/// result cache and retention purging for queue messages.
#[async_trait]
pub trait Maintenance: Send + Sync {
    /// Delete cache entries past their expiry. Returns rows removed.
    async fn evict_expired_cache(&self) -> Result<u64>;

    /// Delete queue messages past their retention window (main 24h,
    /// DLQ 14d by default). Returns rows removed.
    async fn purge_expired_messages(&self) -> Result<u64>;

    /// Current table sizes for logging.
    async fn stats(&self) -> Result<MaintenanceStats>;
}
