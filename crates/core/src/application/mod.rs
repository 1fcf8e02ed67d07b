// Application Layer - Use cases and long-running services

pub mod dlq;
pub mod maintenance;
pub mod retry;
pub mod submission;
pub mod worker;

pub use dlq::{DlqHandler, DlqService};
pub use maintenance::MaintenanceScheduler;
pub use submission::{SubmissionConfig, SubmissionService, SubmitOutcome};
pub use worker::Worker;
