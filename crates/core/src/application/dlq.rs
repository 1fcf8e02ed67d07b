// Dead-Letter Handling - companion-queue consumer + operational surface

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::application::worker::constants::ERROR_RECOVERY_SLEEP_DURATION;
use crate::application::worker::StopToken;
use crate::domain::{DlqEntry, DlqStats, MessageBody, QueueMessage, ReceiptHandle};
use crate::error::{AppError, Result};
use crate::port::{Clock, DlqStore, IdGen, JobQueue, JobStore, QueueConfig};

/// Consumes the companion DLQ: records an entry per dead-lettered message
/// (idempotent on message id), flips the job to `dlq`, then deletes the
/// message so it cannot loop.
pub struct DlqHandler {
    queue: Arc<dyn JobQueue>,
    job_store: Arc<dyn JobStore>,
    dlq_store: Arc<dyn DlqStore>,
    ids: Arc<dyn IdGen>,
    clock: Arc<dyn Clock>,
    queue_config: QueueConfig,
}

impl DlqHandler {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        job_store: Arc<dyn JobStore>,
        dlq_store: Arc<dyn DlqStore>,
        ids: Arc<dyn IdGen>,
        clock: Arc<dyn Clock>,
        queue_config: QueueConfig,
    ) -> Self {
        Self {
            queue,
            job_store,
            dlq_store,
            ids,
            clock,
            queue_config,
        }
    }

    /// Run the consumer loop until shutdown.
    pub async fn run(&self, mut stop: StopToken) -> Result<()> {
        info!("DLQ handler started");
        loop {
            if stop.is_stopped() {
                info!("DLQ handler shutting down");
                break;
            }
            match self.poll_once().await {
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "DLQ handler poll failed");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = stop.stopped() => break,
                    }
                }
            }
        }
        info!("DLQ handler stopped");
        Ok(())
    }

    /// Consume at most one dead-lettered message. Returns true if one was
    /// handled.
    pub async fn poll_once(&self) -> Result<bool> {
        let long_poll = Duration::from_secs(self.queue_config.long_poll_seconds);
        let received = self.queue.receive_dlq(long_poll).await?;
        let (message, receipt) = match received {
            Some(pair) => pair,
            None => return Ok(false),
        };
        self.consume(message, receipt).await?;
        Ok(true)
    }

    async fn consume(&self, message: QueueMessage, receipt: ReceiptHandle) -> Result<()> {
        let body: Option<MessageBody> = match message.parse_body() {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Dead-lettered message body does not parse"
                );
                None
            }
        };

        let job_id = body.as_ref().map(|b| b.job_id.clone()).unwrap_or_default();

        // The worker already wrote the job's last_error; reuse it so the
        // entry carries the failure text even when we arrive first.
        let last_error = if job_id.is_empty() {
            None
        } else {
            self.job_store
                .get(&job_id)
                .await?
                .and_then(|job| job.last_error)
        };

        let entry = DlqEntry::new(
            self.ids.next_id(),
            job_id.clone(),
            message.message_id.clone(),
            message.body.clone(),
            message.receive_count,
            last_error,
            self.clock.now_ms(),
        );

        let inserted = self.dlq_store.record(&entry).await?;
        if inserted {
            info!(
                message_id = %message.message_id,
                job_id = %job_id,
                receive_count = %message.receive_count,
                "Dead-lettered message recorded"
            );
        }

        if !job_id.is_empty() {
            match self
                .job_store
                .mark_dlq(&job_id, &message.message_id, "retry budget exhausted")
                .await
            {
                Ok(()) => {}
                // The worker may have flipped the job already, or the job
                // completed on a late retry; neither blocks cleanup.
                Err(AppError::InvalidState(detail)) => {
                    warn!(job_id = %job_id, detail = %detail, "Job not moved to dlq")
                }
                Err(AppError::NotFound(_)) => {
                    warn!(job_id = %job_id, "Dead-lettered message references unknown job")
                }
                Err(e) => return Err(e),
            }
        }

        // Delete last: everything above is idempotent, so a crash before
        // this point just means one more pass over the message.
        self.queue.delete_dlq(&receipt).await?;
        Ok(())
    }
}

/// Operational surface over recorded DLQ entries: list, stats, resolve and
/// manual requeue.
pub struct DlqService {
    queue: Arc<dyn JobQueue>,
    job_store: Arc<dyn JobStore>,
    dlq_store: Arc<dyn DlqStore>,
}

impl DlqService {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        job_store: Arc<dyn JobStore>,
        dlq_store: Arc<dyn DlqStore>,
    ) -> Self {
        Self {
            queue,
            job_store,
            dlq_store,
        }
    }

    pub async fn list(
        &self,
        resolved: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DlqEntry>> {
        self.dlq_store.list(resolved, limit.clamp(1, 200), offset.max(0)).await
    }

    pub async fn get(&self, id: &str) -> Result<DlqEntry> {
        self.dlq_store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("dlq entry {} not found", id)))
    }

    pub async fn stats(&self) -> Result<DlqStats> {
        self.dlq_store.stats().await
    }

    /// Mark an entry resolved. Idempotent: repeating the call leaves the
    /// resolved flag and reason stable.
    pub async fn resolve(&self, id: &str, reason: &str) -> Result<DlqEntry> {
        let entry = self.dlq_store.resolve(id, reason).await?;
        info!(dlq_id = %id, reason = %reason, "DLQ entry resolved");
        Ok(entry)
    }

    /// Requeue the verbatim message body onto the main queue as a fresh
    /// message, bump the manual retry counter, and reset the job to
    /// `retrying`.
    pub async fn retry(&self, id: &str) -> Result<DlqEntry> {
        let entry = self.get(id).await?;
        let message_id = self.queue.resend_to_main(&entry.message_body).await?;
        self.dlq_store.increment_retry(id).await?;

        if !entry.job_id.is_empty() {
            match self
                .job_store
                .mark_retrying(&entry.job_id, entry.receive_count, "requeued from dlq")
                .await
            {
                Ok(()) => {}
                Err(AppError::InvalidState(detail)) => {
                    warn!(job_id = %entry.job_id, detail = %detail, "Job not reset to retrying")
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            dlq_id = %id,
            job_id = %entry.job_id,
            new_message_id = %message_id,
            "DLQ entry requeued to main"
        );
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Fingerprint, Job, JobStatus};
    use crate::port::clock::mocks::{ManualClock, SeqIds};
    use crate::port::dlq_store::mocks::InMemoryDlqStore;
    use crate::port::job_queue::mocks::InMemoryQueue;
    use crate::port::job_store::mocks::InMemoryJobStore;

    struct Fixture {
        queue: Arc<InMemoryQueue>,
        store: Arc<InMemoryJobStore>,
        dlq_store: Arc<InMemoryDlqStore>,
        handler: DlqHandler,
        service: DlqService,
    }

    fn fixture() -> Fixture {
        let time: Arc<ManualClock> = Arc::new(ManualClock::new(5_000));
        let queue = Arc::new(InMemoryQueue::new(3));
        let store = Arc::new(InMemoryJobStore::new(time.clone()));
        let dlq_store = Arc::new(InMemoryDlqStore::new(time.clone()));
        let config = QueueConfig {
            long_poll_seconds: 0,
            ..QueueConfig::default()
        };
        let handler = DlqHandler::new(
            queue.clone(),
            store.clone(),
            dlq_store.clone(),
            Arc::new(SeqIds::new("dlq")),
            time,
            config,
        );
        let service = DlqService::new(queue.clone(), store.clone(), dlq_store.clone());
        Fixture {
            queue,
            store,
            dlq_store,
            handler,
            service,
        }
    }

    /// Exhaust a message's retry budget so the transport routes it to the
    /// companion DLQ.
    async fn dead_letter_one(fx: &Fixture, job_id: &str) {
        let job = Job::new_queued(
            job_id,
            1_000,
            None,
            Fingerprint::of_bytes(b"x"),
            "force_fail.js",
            "x",
        );
        fx.store.create(&job).await.unwrap();
        fx.store
            .mark_retrying(&job_id.to_string(), 3, "forced failure for force_fail.js")
            .await
            .unwrap();

        let body = MessageBody {
            job_id: job_id.to_string(),
            code_hash: Fingerprint::of_bytes(b"x"),
            file_name: "force_fail.js".to_string(),
            file_content: "x".to_string(),
        };
        fx.queue.enqueue(&body).await.unwrap();
        for _ in 0..3 {
            let (_, _receipt) = fx
                .queue
                .receive(Duration::from_secs(0))
                .await
                .unwrap()
                .unwrap();
            fx.queue.expire_leases();
        }
        // Fourth receive attempt triggers the redrive.
        assert!(fx.queue.receive(Duration::from_secs(0)).await.unwrap().is_none());
        assert_eq!(fx.queue.dlq_depth(), 1);
    }

    #[tokio::test]
    async fn handler_records_entry_flips_job_and_deletes() {
        let fx = fixture();
        dead_letter_one(&fx, "job-1").await;

        assert!(fx.handler.poll_once().await.unwrap());

        let stats = fx.dlq_store.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.unresolved, 1);
        assert_eq!(stats.unique_jobs, 1);

        let job = fx.store.get(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Dlq);
        assert!(job.dlq_message_id.is_some());

        // Message consumed; a second poll finds nothing.
        assert_eq!(fx.queue.dlq_depth(), 0);
        assert!(!fx.handler.poll_once().await.unwrap());
    }

    #[tokio::test]
    async fn handler_is_idempotent_on_message_id() {
        let fx = fixture();
        dead_letter_one(&fx, "job-1").await;
        assert!(fx.handler.poll_once().await.unwrap());

        // Entry for the same message recorded by the worker beforehand must
        // not duplicate.
        let entries = fx.dlq_store.list(None, 50, 0).await.unwrap();
        assert_eq!(entries.len(), 1);
        let dup = entries[0].clone();
        assert!(!fx.dlq_store.record(&dup).await.unwrap());
        assert_eq!(fx.dlq_store.list(None, 50, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let fx = fixture();
        dead_letter_one(&fx, "job-1").await;
        fx.handler.poll_once().await.unwrap();

        let entry = &fx.service.list(None, 50, 0).await.unwrap()[0];
        let resolved = fx.service.resolve(&entry.id, "not actionable").await.unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.resolution_reason.as_deref(), Some("not actionable"));
        let first_resolved_at = resolved.resolved_at;

        let again = fx.service.resolve(&entry.id, "not actionable").await.unwrap();
        assert!(again.resolved);
        assert_eq!(again.resolution_reason.as_deref(), Some("not actionable"));
        assert_eq!(again.resolved_at, first_resolved_at);
    }

    #[tokio::test]
    async fn retry_requeues_verbatim_and_resets_job() {
        let fx = fixture();
        dead_letter_one(&fx, "job-1").await;
        fx.handler.poll_once().await.unwrap();

        let entry = fx.service.list(None, 50, 0).await.unwrap()[0].clone();
        let updated = fx.service.retry(&entry.id).await.unwrap();
        assert_eq!(updated.retry_count, 1);

        // Fresh message on the main queue with the original body.
        assert_eq!(fx.queue.main_depth(), 1);
        let (msg, _receipt) = fx
            .queue
            .receive(Duration::from_secs(0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.body, entry.message_body);
        assert_eq!(msg.receive_count, 1);

        let job = fx.store.get(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Retrying);
    }

    #[tokio::test]
    async fn retry_of_unknown_entry_is_not_found() {
        let fx = fixture();
        let err = fx.service.retry("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
