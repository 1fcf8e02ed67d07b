// SQLite JobQueue Implementation
//
// One table, two logical queues ('main' and 'dlq'). Receiving claims a row
// atomically: it stamps a fresh receipt, pushes visible_at past the
// visibility lease and increments receive_count, all in one conditional
// UPDATE ... RETURNING. A row whose lease expired is claimable again with
// the same message id (at-least-once delivery). The redrive policy runs at
// receive time: any visible main-queue row that has already been delivered
// max_receive_count times is flipped to the 'dlq' queue instead of being
// delivered again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use codesift_core::domain::{MessageBody, QueueMessage, ReceiptHandle};
use codesift_core::error::{AppError, Result};
use codesift_core::port::{Clock, IdGen, JobQueue, QueueConfig};

use crate::map_sqlx_error;

/// Interval between claim attempts while long-polling.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const MAIN_QUEUE: &str = "main";
const DLQ_QUEUE: &str = "dlq";

pub struct SqliteJobQueue {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGen>,
    config: QueueConfig,
}

impl SqliteJobQueue {
    pub fn new(
        pool: SqlitePool,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGen>,
        config: QueueConfig,
    ) -> Self {
        Self {
            pool,
            clock,
            ids,
            config,
        }
    }

    async fn insert_message(&self, raw_body: &str) -> Result<String> {
        let message_id = self.ids.next_id();
        let now = self.clock.now_ms();
        sqlx::query(
            r#"
            INSERT INTO queue_messages
                (message_id, queue, body, receive_count, visible_at, enqueued_at)
            VALUES (?, 'main', ?, 0, ?, ?)
            "#,
        )
        .bind(&message_id)
        .bind(raw_body)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(message_id)
    }

    /// Route exhausted main-queue messages to the DLQ. Runs before every
    /// claim attempt so a message is never delivered past its budget.
    async fn redrive(&self, now: i64) -> Result<()> {
        let moved = sqlx::query(
            r#"
            UPDATE queue_messages
            SET queue = 'dlq', receipt = NULL, visible_at = ?
            WHERE queue = 'main' AND visible_at <= ? AND receive_count >= ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(self.config.max_receive_count)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if moved.rows_affected() > 0 {
            info!(
                moved = %moved.rows_affected(),
                "Messages exceeded max receive count, routed to DLQ"
            );
        }
        Ok(())
    }

    async fn try_claim(
        &self,
        queue: &str,
        count_delivery: bool,
    ) -> Result<Option<(QueueMessage, ReceiptHandle)>> {
        let now = self.clock.now_ms();
        if queue == MAIN_QUEUE {
            self.redrive(now).await?;
        }

        let receipt = format!("rcpt-{}", self.ids.next_id());
        let invisible_until = now + self.config.visibility_seconds * 1000;
        let increment = if count_delivery { 1 } else { 0 };

        let row: Option<(String, String, i64)> = sqlx::query_as(
            r#"
            UPDATE queue_messages
            SET receipt = ?, visible_at = ?, receive_count = receive_count + ?
            WHERE message_id = (
                SELECT message_id FROM queue_messages
                WHERE queue = ? AND visible_at <= ?
                ORDER BY enqueued_at ASC, message_id ASC
                LIMIT 1
            )
            RETURNING message_id, body, receive_count
            "#,
        )
        .bind(&receipt)
        .bind(invisible_until)
        .bind(increment)
        .bind(queue)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|(message_id, body, receive_count)| {
            debug!(message_id = %message_id, receive_count = %receive_count, queue = %queue, "Message claimed");
            (
                QueueMessage {
                    message_id,
                    body,
                    receive_count,
                },
                ReceiptHandle(receipt),
            )
        }))
    }

    async fn long_poll(
        &self,
        queue: &str,
        count_delivery: bool,
        max_wait: Duration,
    ) -> Result<Option<(QueueMessage, ReceiptHandle)>> {
        let deadline = Instant::now() + max_wait;
        loop {
            if let Some(claimed) = self.try_claim(queue, count_delivery).await? {
                return Ok(Some(claimed));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(POLL_INTERVAL.min(max_wait)).await;
        }
    }

    async fn delete_by_receipt(&self, queue: &str, receipt: &ReceiptHandle) -> Result<()> {
        // A stale receipt (lease expired, message reclaimed) deletes
        // nothing; the redelivered copy owns the row now.
        sqlx::query("DELETE FROM queue_messages WHERE queue = ? AND receipt = ?")
            .bind(queue)
            .bind(receipt.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, body: &MessageBody) -> Result<String> {
        let raw = serde_json::to_string(body)?;
        let message_id = self.insert_message(&raw).await?;
        debug!(message_id = %message_id, job_id = %body.job_id, "Message enqueued");
        Ok(message_id)
    }

    async fn receive(&self, max_wait: Duration) -> Result<Option<(QueueMessage, ReceiptHandle)>> {
        self.long_poll(MAIN_QUEUE, true, max_wait).await
    }

    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()> {
        self.delete_by_receipt(MAIN_QUEUE, receipt).await
    }

    async fn resend_to_main(&self, raw_body: &str) -> Result<String> {
        if raw_body.is_empty() {
            return Err(AppError::Queue("cannot requeue an empty body".to_string()));
        }
        self.insert_message(raw_body).await
    }

    async fn receive_dlq(
        &self,
        max_wait: Duration,
    ) -> Result<Option<(QueueMessage, ReceiptHandle)>> {
        // DLQ receives keep the receive-count the message died with.
        self.long_poll(DLQ_QUEUE, false, max_wait).await
    }

    async fn delete_dlq(&self, receipt: &ReceiptHandle) -> Result<()> {
        self.delete_by_receipt(DLQ_QUEUE, receipt).await
    }
}
