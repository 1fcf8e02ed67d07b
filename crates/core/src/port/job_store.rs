// Job Store Port (Interface)

use crate::domain::{Fingerprint, Job, JobCounts, JobId, JobStatus, JobSummary, OwnerId, Report};
use crate::error::Result;
use async_trait::async_trait;

/// Durable interface over `Job` records; the single source of truth for job
/// state. Every operation is atomic at row granularity, and the mutating
/// operations are conditional so redelivered messages cannot regress a
/// terminal row (`complete` stays complete).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job in its initial status (`queued`, or `complete` for
    /// the cache-hit path).
    async fn create(&self, job: &Job) -> Result<()>;

    /// Find job by ID.
    async fn get(&self, id: &JobId) -> Result<Option<Job>>;

    /// Transition to `processing`, recording the delivery attempt count.
    /// Fails with `InvalidState` if the row is already terminal.
    async fn mark_processing(&self, id: &JobId, attempts: i64) -> Result<()>;

    /// Terminal success: store the report, stamp `completed_at`, record the
    /// wall-clock duration. At most one call succeeds per job.
    async fn complete(
        &self,
        id: &JobId,
        report: &Report,
        duration_ms: i64,
        attempts: i64,
    ) -> Result<()>;

    /// Record a failed attempt; the message stays queued for redelivery.
    async fn mark_retrying(&self, id: &JobId, attempts: i64, error: &str) -> Result<()>;

    /// Move the job to `dlq`, linking the dead-lettered message.
    async fn mark_dlq(&self, id: &JobId, message_id: &str, error: &str) -> Result<()>;

    /// Observability lookup: all jobs sharing a content fingerprint.
    async fn find_by_fingerprint(&self, fp: &Fingerprint) -> Result<Vec<Job>>;

    /// Most recent jobs for one owner, newest first.
    async fn history(&self, owner: OwnerId, limit: i64) -> Result<Vec<JobSummary>>;

    /// Count of jobs in one status (queue-depth estimation).
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;

    /// Per-status totals plus cache hit/miss counters for the stats surface.
    async fn counts(&self) -> Result<JobCounts>;

    /// Ensure an owner row exists (`INSERT OR IGNORE` semantics).
    async fn ensure_owner(&self, owner: OwnerId) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::port::Clock;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// In-memory job store with the same conditional-transition guards as
    /// the durable implementation.
    pub struct InMemoryJobStore {
        jobs: Mutex<HashMap<JobId, Job>>,
        owners: Mutex<HashSet<OwnerId>>,
        clock: Arc<dyn Clock>,
    }

    impl InMemoryJobStore {
        pub fn new(clock: Arc<dyn Clock>) -> Self {
            Self {
                jobs: Mutex::new(HashMap::new()),
                owners: Mutex::new(HashSet::new()),
                clock,
            }
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn create(&self, job: &Job) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.contains_key(&job.id) {
                return Err(AppError::Database(format!("duplicate job id {}", job.id)));
            }
            jobs.insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn get(&self, id: &JobId) -> Result<Option<Job>> {
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }

        async fn mark_processing(&self, id: &JobId, attempts: i64) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("job {} not found", id)))?;
            if job.status == JobStatus::Complete {
                return Err(AppError::InvalidState(format!(
                    "job {} already complete",
                    id
                )));
            }
            job.status = JobStatus::Processing;
            job.attempts = attempts;
            Ok(())
        }

        async fn complete(
            &self,
            id: &JobId,
            report: &Report,
            duration_ms: i64,
            attempts: i64,
        ) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("job {} not found", id)))?;
            if job.status == JobStatus::Complete {
                return Err(AppError::InvalidState(format!(
                    "job {} already complete",
                    id
                )));
            }
            job.status = JobStatus::Complete;
            job.result = Some(report.clone());
            job.completed_at = Some(self.clock.now_ms());
            job.processing_time_ms = Some(duration_ms);
            job.attempts = attempts;
            job.last_error = None;
            Ok(())
        }

        async fn mark_retrying(&self, id: &JobId, attempts: i64, error: &str) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("job {} not found", id)))?;
            if job.status == JobStatus::Complete {
                return Err(AppError::InvalidState(format!(
                    "job {} already complete",
                    id
                )));
            }
            job.status = JobStatus::Retrying;
            job.attempts = attempts;
            job.last_error = Some(error.to_string());
            Ok(())
        }

        async fn mark_dlq(&self, id: &JobId, message_id: &str, error: &str) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("job {} not found", id)))?;
            if job.status == JobStatus::Complete {
                return Err(AppError::InvalidState(format!(
                    "job {} already complete",
                    id
                )));
            }
            job.status = JobStatus::Dlq;
            job.dlq_message_id = Some(message_id.to_string());
            job.dlq_moved_at = Some(self.clock.now_ms());
            job.last_error = Some(error.to_string());
            Ok(())
        }

        async fn find_by_fingerprint(&self, fp: &Fingerprint) -> Result<Vec<Job>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| &j.code_hash == fp)
                .cloned()
                .collect())
        }

        async fn history(&self, owner: OwnerId, limit: i64) -> Result<Vec<JobSummary>> {
            let jobs = self.jobs.lock().unwrap();
            let mut rows: Vec<&Job> = jobs.values().filter(|j| j.owner == Some(owner)).collect();
            rows.sort_by_key(|j| std::cmp::Reverse(j.created_at));
            Ok(rows
                .into_iter()
                .take(limit as usize)
                .map(|j| JobSummary {
                    id: j.id.clone(),
                    file_name: j.file_name.clone(),
                    status: j.status,
                    cache_hit: j.cache_hit,
                    processing_time_ms: j.processing_time_ms,
                    created_at: j.created_at,
                    issues_found: j.result.as_ref().map(|r| r.issue_count()).unwrap_or(0),
                })
                .collect())
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.status == status)
                .count() as i64)
        }

        async fn counts(&self) -> Result<JobCounts> {
            let jobs = self.jobs.lock().unwrap();
            let mut counts = JobCounts::default();
            for job in jobs.values() {
                counts.total += 1;
                match job.status {
                    JobStatus::Queued => counts.queued += 1,
                    JobStatus::Processing => counts.processing += 1,
                    JobStatus::Retrying => counts.retrying += 1,
                    JobStatus::Complete => counts.complete += 1,
                    JobStatus::Dlq => counts.dlq += 1,
                }
                if job.cache_hit {
                    counts.cache_hits += 1;
                } else {
                    counts.cache_misses += 1;
                }
            }
            Ok(counts)
        }

        async fn ensure_owner(&self, owner: OwnerId) -> Result<()> {
            self.owners.lock().unwrap().insert(owner);
            Ok(())
        }
    }
}
