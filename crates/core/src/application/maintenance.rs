// Maintenance Scheduler - periodic storage housekeeping

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::application::worker::StopToken;
use crate::port::Maintenance;

/// Runs cache eviction and queue retention purging on a fixed interval.
pub struct MaintenanceScheduler {
    maintenance: Arc<dyn Maintenance>,
    interval: Duration,
}

impl MaintenanceScheduler {
    pub fn new(maintenance: Arc<dyn Maintenance>, interval: Duration) -> Self {
        Self {
            maintenance,
            interval,
        }
    }

    pub async fn run(&self, mut stop: StopToken) {
        info!(interval_secs = %self.interval.as_secs(), "Maintenance scheduler started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = stop.stopped() => {
                    info!("Maintenance scheduler shutting down");
                    break;
                }
            }
            self.run_once().await;
        }
    }

    pub async fn run_once(&self) {
        match self.maintenance.evict_expired_cache().await {
            Ok(evicted) if evicted > 0 => info!(evicted = %evicted, "Expired cache entries evicted"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Cache eviction failed"),
        }
        match self.maintenance.purge_expired_messages().await {
            Ok(purged) if purged > 0 => info!(purged = %purged, "Expired queue messages purged"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Queue retention purge failed"),
        }
        match self.maintenance.stats().await {
            Ok(stats) => info!(
                cache_entries = %stats.cache_entries,
                queue_messages = %stats.queue_messages,
                jobs = %stats.job_count,
                "Maintenance pass complete"
            ),
            Err(e) => error!(error = %e, "Maintenance stats failed"),
        }
    }
}
