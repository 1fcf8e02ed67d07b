// Queue Message Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::fingerprint::Fingerprint;

/// Payload carried by a queue message. Serialized as JSON into the message
/// body; the worker re-parses it on receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBody {
    pub job_id: String,
    pub code_hash: Fingerprint,
    pub file_name: String,
    pub file_content: String,
}

/// A message as delivered by the transport.
///
/// `body` is kept verbatim (the DLQ records it unparsed); `receive_count`
/// is the transport's monotonic delivery counter for this message.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    pub receive_count: i64,
}

impl QueueMessage {
    pub fn parse_body(&self) -> serde_json::Result<MessageBody> {
        serde_json::from_str(&self.body)
    }
}

/// Transient ownership token for a received message.
///
/// Valid for the duration of the visibility lease; `delete` consumes it.
/// Once the lease expires the transport may redeliver the message and the
/// handle goes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
