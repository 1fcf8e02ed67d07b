// Domain Layer - Pure business logic and entities

pub mod dlq;
pub mod fingerprint;
pub mod job;
pub mod message;
pub mod report;

// Re-exports
pub use dlq::{DlqEntry, DlqStats};
pub use fingerprint::Fingerprint;
pub use job::{Job, JobCounts, JobId, JobStatus, JobSummary, OwnerId};
pub use message::{MessageBody, QueueMessage, ReceiptHandle};
pub use report::{
    AiCategory, AiSuggestion, Bucket, Grade, Issue, IssueCategory, Report, ReportMetrics, Severity,
};
