// Job Queue Port (Interface)

use std::time::Duration;

use crate::domain::{MessageBody, QueueMessage, ReceiptHandle};
use crate::error::Result;
use async_trait::async_trait;

/// Transport configuration: main queue + companion DLQ with a redrive
/// policy keyed on `max_receive_count`.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Visibility lease granted to each receive, in seconds.
    pub visibility_seconds: i64,
    /// Receives after which the transport routes a message to the DLQ.
    pub max_receive_count: i64,
    /// Upper bound on how long a receive call may block.
    pub long_poll_seconds: u64,
    /// Main-queue message retention, in seconds.
    pub retention_seconds: i64,
    /// Companion-DLQ message retention, in seconds.
    pub dlq_retention_seconds: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_seconds: 30,
            max_receive_count: 3,
            long_poll_seconds: 10,
            retention_seconds: 86_400,
            dlq_retention_seconds: 1_209_600,
        }
    }
}

/// At-least-once message transport with visibility-timeout redelivery.
///
/// A received message stays invisible for the visibility lease; deleting it
/// with its receipt handle consumes it, otherwise the transport redelivers
/// and increments the receive-count. Once the count reaches
/// `max_receive_count` the message is routed to the companion DLQ instead of
/// being delivered again, which is why a failing worker must NEVER delete:
/// deletion on failure would lose the message before the redrive fires.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a body on the main queue; returns the message id.
    async fn enqueue(&self, body: &MessageBody) -> Result<String>;

    /// Receive one message from the main queue, blocking up to `max_wait`.
    async fn receive(&self, max_wait: Duration) -> Result<Option<(QueueMessage, ReceiptHandle)>>;

    /// Delete a received main-queue message within its visibility lease.
    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()>;

    /// Requeue a verbatim body onto the main queue as a fresh message
    /// (receive-count restarts at zero). Used by the DLQ retry surface.
    async fn resend_to_main(&self, raw_body: &str) -> Result<String>;

    /// Receive one message from the companion DLQ.
    async fn receive_dlq(
        &self,
        max_wait: Duration,
    ) -> Result<Option<(QueueMessage, ReceiptHandle)>>;

    /// Delete a received DLQ message.
    async fn delete_dlq(&self, receipt: &ReceiptHandle) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct StoredMessage {
        message_id: String,
        body: String,
        receive_count: i64,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Lane {
        Main,
        Dlq,
    }

    #[derive(Default)]
    struct QueueState {
        main: VecDeque<StoredMessage>,
        dlq: VecDeque<StoredMessage>,
        inflight: HashMap<String, (Lane, StoredMessage)>,
    }

    /// In-memory transport with explicit lease control.
    ///
    /// Instead of wall-clock visibility leases, received messages sit in an
    /// inflight set until `expire_leases` is called, giving tests
    /// deterministic redelivery. The redrive policy matches the durable
    /// implementation: a main-queue message that has already been delivered
    /// `max_receive_count` times is routed to the DLQ lane on the next
    /// receive attempt instead of being delivered.
    pub struct InMemoryQueue {
        state: Mutex<QueueState>,
        max_receive_count: i64,
        next_id: AtomicU64,
    }

    impl InMemoryQueue {
        pub fn new(max_receive_count: i64) -> Self {
            Self {
                state: Mutex::new(QueueState::default()),
                max_receive_count,
                next_id: AtomicU64::new(0),
            }
        }

        fn fresh_id(&self) -> String {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            format!("msg-{}", n)
        }

        /// Return every inflight message to its lane (front), simulating
        /// visibility-lease expiry.
        pub fn expire_leases(&self) {
            let mut state = self.state.lock().unwrap();
            let inflight: Vec<(Lane, StoredMessage)> =
                state.inflight.drain().map(|(_, v)| v).collect();
            for (lane, msg) in inflight {
                match lane {
                    Lane::Main => state.main.push_front(msg),
                    Lane::Dlq => state.dlq.push_front(msg),
                }
            }
        }

        pub fn main_depth(&self) -> usize {
            self.state.lock().unwrap().main.len()
        }

        pub fn dlq_depth(&self) -> usize {
            self.state.lock().unwrap().dlq.len()
        }

        pub fn inflight_count(&self) -> usize {
            self.state.lock().unwrap().inflight.len()
        }
    }

    #[async_trait]
    impl JobQueue for InMemoryQueue {
        async fn enqueue(&self, body: &MessageBody) -> Result<String> {
            let message_id = self.fresh_id();
            let raw = serde_json::to_string(body)?;
            self.state.lock().unwrap().main.push_back(StoredMessage {
                message_id: message_id.clone(),
                body: raw,
                receive_count: 0,
            });
            Ok(message_id)
        }

        async fn receive(
            &self,
            _max_wait: Duration,
        ) -> Result<Option<(QueueMessage, ReceiptHandle)>> {
            let mut state = self.state.lock().unwrap();
            while let Some(mut msg) = state.main.pop_front() {
                if msg.receive_count >= self.max_receive_count {
                    // Redrive: exhausted messages route to the DLQ lane.
                    state.dlq.push_back(msg);
                    continue;
                }
                msg.receive_count += 1;
                let receipt = ReceiptHandle(format!("rcpt-{}", self.fresh_id()));
                let delivered = QueueMessage {
                    message_id: msg.message_id.clone(),
                    body: msg.body.clone(),
                    receive_count: msg.receive_count,
                };
                state.inflight.insert(receipt.0.clone(), (Lane::Main, msg));
                return Ok(Some((delivered, receipt)));
            }
            Ok(None)
        }

        async fn delete(&self, receipt: &ReceiptHandle) -> Result<()> {
            self.state.lock().unwrap().inflight.remove(&receipt.0);
            Ok(())
        }

        async fn resend_to_main(&self, raw_body: &str) -> Result<String> {
            let message_id = self.fresh_id();
            self.state.lock().unwrap().main.push_back(StoredMessage {
                message_id: message_id.clone(),
                body: raw_body.to_string(),
                receive_count: 0,
            });
            Ok(message_id)
        }

        async fn receive_dlq(
            &self,
            _max_wait: Duration,
        ) -> Result<Option<(QueueMessage, ReceiptHandle)>> {
            let mut state = self.state.lock().unwrap();
            if let Some(msg) = state.dlq.pop_front() {
                let receipt = ReceiptHandle(format!("rcpt-{}", self.fresh_id()));
                let delivered = QueueMessage {
                    message_id: msg.message_id.clone(),
                    body: msg.body.clone(),
                    receive_count: msg.receive_count,
                };
                state.inflight.insert(receipt.0.clone(), (Lane::Dlq, msg));
                return Ok(Some((delivered, receipt)));
            }
            Ok(None)
        }

        async fn delete_dlq(&self, receipt: &ReceiptHandle) -> Result<()> {
            self.state.lock().unwrap().inflight.remove(&receipt.0);
            Ok(())
        }
    }
}
