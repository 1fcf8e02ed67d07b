// Port Layer - Interfaces for external dependencies

pub mod analyzer;
pub mod clock;
pub mod dlq_store;
pub mod job_queue;
pub mod job_store;
pub mod maintenance;
pub mod result_cache;

// Re-exports
pub use analyzer::{AnalysisError, Analyzer};
pub use clock::{Clock, IdGen, SystemClock, UuidGen};
pub use dlq_store::DlqStore;
pub use job_queue::{JobQueue, QueueConfig};
pub use job_store::JobStore;
pub use maintenance::{Maintenance, MaintenanceStats};
pub use result_cache::{CacheConfig, ResultCache};
