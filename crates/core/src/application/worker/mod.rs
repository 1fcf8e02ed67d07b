// Worker - review job processing loop

pub mod constants;

use constants::*;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::application::retry::with_retries;
use crate::domain::{DlqEntry, JobStatus, MessageBody, QueueMessage, ReceiptHandle};
use crate::error::{AppError, Result};
use crate::port::{
    Analyzer, Clock, DlqStore, IdGen, JobQueue, JobStore, QueueConfig, ResultCache,
};

/// Coordinated stop signal for the pipeline's long-running loops (workers,
/// DLQ handler, maintenance, HTTP server). The daemon creates one
/// `Shutdown` and hands each loop a subscribed [`StopToken`]; triggering it
/// lets every loop finish its in-flight message and exit. Messages not yet
/// deleted at exit redeliver once their visibility lease expires.
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe a loop to this signal.
    pub fn token(&self) -> StopToken {
        StopToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Tell every subscribed loop to stop. Tokens subscribed afterwards
    /// also observe the signal.
    pub fn trigger(&self) {
        let _ = self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// One loop's view of the shutdown signal.
#[derive(Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires.
    pub async fn stopped(&mut self) {
        let _ = self.rx.changed().await;
    }
}

/// Competes with its peers for messages on the main queue, dispatches the
/// analyzer, and participates in the retry/DLQ contract:
///
/// - success: cache the report, complete the job, delete the message;
/// - failure below the retry budget: mark the job `retrying` and leave the
///   message so the visibility lease redelivers it;
/// - failure at the budget: record a DLQ entry, mark the job `dlq`, and
///   still leave the message; deleting here would lose it before the
///   transport's redrive moves it to the companion DLQ.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    job_store: Arc<dyn JobStore>,
    cache: Arc<dyn ResultCache>,
    dlq_store: Arc<dyn DlqStore>,
    analyzer: Arc<dyn Analyzer>,
    ids: Arc<dyn IdGen>,
    clock: Arc<dyn Clock>,
    queue_config: QueueConfig,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<dyn JobQueue>,
        job_store: Arc<dyn JobStore>,
        cache: Arc<dyn ResultCache>,
        dlq_store: Arc<dyn DlqStore>,
        analyzer: Arc<dyn Analyzer>,
        ids: Arc<dyn IdGen>,
        clock: Arc<dyn Clock>,
        queue_config: QueueConfig,
    ) -> Self {
        Self {
            queue,
            job_store,
            cache,
            dlq_store,
            analyzer,
            ids,
            clock,
            queue_config,
        }
    }

    /// Run the worker loop until the stop signal fires. The in-flight
    /// message is finished before exiting.
    pub async fn run(&self, mut stop: StopToken) -> Result<()> {
        info!("Worker started");
        loop {
            if stop.is_stopped() {
                info!("Worker shutting down");
                break;
            }
            match self.poll_once().await {
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Worker poll failed");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = stop.stopped() => {
                            info!("Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!("Worker stopped");
        Ok(())
    }

    /// Receive and process at most one message. Returns true if a message
    /// was handled.
    pub async fn poll_once(&self) -> Result<bool> {
        let long_poll = Duration::from_secs(self.queue_config.long_poll_seconds);
        let received = self.queue.receive(long_poll).await?;
        let (message, receipt) = match received {
            Some(pair) => pair,
            None => return Ok(false),
        };
        self.process_message(message, receipt).await?;
        Ok(true)
    }

    async fn process_message(&self, message: QueueMessage, receipt: ReceiptHandle) -> Result<()> {
        // A body that does not parse will never parse; delete it so it
        // cannot clog the queue.
        let body: MessageBody = match message.parse_body() {
            Ok(body) => body,
            Err(e) => {
                error!(
                    message_id = %message.message_id,
                    error = %e,
                    "Malformed queue message, deleting"
                );
                self.queue.delete(&receipt).await?;
                return Ok(());
            }
        };

        let terminal_attempt = message.receive_count >= self.queue_config.max_receive_count;
        if terminal_attempt {
            warn!(
                job_id = %body.job_id,
                receive_count = %message.receive_count,
                "Terminal delivery attempt; next failure routes to the DLQ"
            );
        }

        // Idempotent completion: a crash between `complete` and `delete`
        // causes redelivery of a finished job. Short-circuit it here.
        let job = self.job_store.get(&body.job_id).await?;
        match job {
            None => {
                warn!(job_id = %body.job_id, "Message references unknown job, deleting");
                self.queue.delete(&receipt).await?;
                return Ok(());
            }
            Some(job) if job.status == JobStatus::Complete => {
                info!(job_id = %body.job_id, "Job already complete, deleting redelivered message");
                self.queue.delete(&receipt).await?;
                return Ok(());
            }
            Some(_) => {}
        }

        match self
            .mark_processing(&body.job_id, message.receive_count)
            .await
        {
            Ok(()) => {}
            Err(AppError::InvalidState(msg)) => {
                // Lost a race against a terminal transition; leave the
                // message for the lease to sort out.
                warn!(job_id = %body.job_id, detail = %msg, "Skipping message in terminal state");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let started = self.clock.now_ms();
        let analysis = self
            .analyzer
            .analyze(&body.file_content, &body.file_name)
            .await;
        let duration_ms = self.clock.now_ms() - started;

        match analysis {
            Ok(report) => {
                // Best-effort: same-fingerprint writes are value-equivalent,
                // so a lost put only costs a future recompute.
                if let Err(e) = self.cache.put(&body.code_hash, &report).await {
                    warn!(
                        fingerprint = %body.code_hash,
                        error = %e,
                        "Cache put failed (ignored)"
                    );
                }

                let job_store = &self.job_store;
                with_retries(
                    "job_store.complete",
                    STORE_WRITE_ATTEMPTS,
                    STORE_WRITE_RETRY_DELAY,
                    || job_store.complete(&body.job_id, &report, duration_ms, message.receive_count),
                )
                .await?;

                info!(
                    job_id = %body.job_id,
                    duration_ms = %duration_ms,
                    issues = %report.issue_count(),
                    "Job complete"
                );
                self.queue.delete(&receipt).await?;
                Ok(())
            }
            Err(analysis_error) => {
                let error_text = analysis_error.to_string();
                if terminal_attempt {
                    error!(
                        job_id = %body.job_id,
                        receive_count = %message.receive_count,
                        error = %error_text,
                        "Retry budget exhausted, dead-lettering"
                    );
                    let entry = DlqEntry::new(
                        self.ids.next_id(),
                        body.job_id.clone(),
                        message.message_id.clone(),
                        message.body.clone(),
                        message.receive_count,
                        Some(error_text.clone()),
                        self.clock.now_ms(),
                    );
                    self.dlq_store.record(&entry).await?;
                    let job_store = &self.job_store;
                    with_retries(
                        "job_store.mark_dlq",
                        STORE_WRITE_ATTEMPTS,
                        STORE_WRITE_RETRY_DELAY,
                        || job_store.mark_dlq(&body.job_id, &message.message_id, &error_text),
                    )
                    .await?;
                    // Deliberately NOT deleted: the transport's redrive
                    // routes this message to the companion DLQ.
                } else {
                    warn!(
                        job_id = %body.job_id,
                        receive_count = %message.receive_count,
                        error = %error_text,
                        "Analysis failed, leaving message for redelivery"
                    );
                    let job_store = &self.job_store;
                    with_retries(
                        "job_store.mark_retrying",
                        STORE_WRITE_ATTEMPTS,
                        STORE_WRITE_RETRY_DELAY,
                        || job_store.mark_retrying(&body.job_id, message.receive_count, &error_text),
                    )
                    .await?;
                }
                Ok(())
            }
        }
    }

    async fn mark_processing(&self, job_id: &str, attempts: i64) -> Result<()> {
        let job_store = &self.job_store;
        let job_id = job_id.to_string();
        with_retries(
            "job_store.mark_processing",
            STORE_WRITE_ATTEMPTS,
            STORE_WRITE_RETRY_DELAY,
            || job_store.mark_processing(&job_id, attempts),
        )
        .await
    }
}
