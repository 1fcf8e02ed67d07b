// Submission Use Case - front-end of the review pipeline

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{Fingerprint, Job, JobId, JobStatus, JobSummary, MessageBody, OwnerId, Report};
use crate::error::{AppError, Result};
use crate::port::{Clock, IdGen, JobQueue, JobStore, ResultCache};

/// History listings are capped regardless of the requested limit.
pub const MAX_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone, Default)]
pub struct SubmissionConfig {
    /// Reject submissions larger than this many bytes (None = no ceiling).
    pub max_content_bytes: Option<usize>,
}

/// Outcome of a submit call. `result` is present only on the synchronous
/// cache-hit path.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    pub cache_hit: bool,
    pub result: Option<Report>,
}

/// Handles cache lookup, job creation, enqueue and status read-out.
pub struct SubmissionService {
    job_store: Arc<dyn JobStore>,
    cache: Arc<dyn ResultCache>,
    queue: Arc<dyn JobQueue>,
    ids: Arc<dyn IdGen>,
    clock: Arc<dyn Clock>,
    config: SubmissionConfig,
}

impl SubmissionService {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        cache: Arc<dyn ResultCache>,
        queue: Arc<dyn JobQueue>,
        ids: Arc<dyn IdGen>,
        clock: Arc<dyn Clock>,
        config: SubmissionConfig,
    ) -> Self {
        Self {
            job_store,
            cache,
            queue,
            ids,
            clock,
            config,
        }
    }

    /// Submit a file for review.
    ///
    /// Hashes the raw content, probes the cache, and either answers
    /// synchronously from a cached report (writing the job row first so
    /// status polls see a consistent view) or persists a `queued` job and
    /// enqueues a message for the workers.
    pub async fn submit(
        &self,
        file_name: &str,
        content: &str,
        owner: Option<OwnerId>,
    ) -> Result<SubmitOutcome> {
        if content.is_empty() {
            return Err(AppError::InvalidInput("file content is empty".to_string()));
        }
        if let Some(max) = self.config.max_content_bytes {
            if content.len() > max {
                return Err(AppError::InvalidInput(format!(
                    "file content exceeds {} bytes",
                    max
                )));
            }
        }

        let fingerprint = Fingerprint::of_bytes(content.as_bytes());
        if let Some(owner) = owner {
            self.job_store.ensure_owner(owner).await?;
        }

        // A degraded cache must not take submissions down: treat errors as
        // misses and let the pipeline recompute.
        let cached = match self.cache.get(&fingerprint).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Cache probe failed, treating as miss");
                None
            }
        };

        let job_id = self.ids.next_id();
        let now = self.clock.now_ms();

        if let Some(report) = cached {
            let job = Job::new_cached(
                job_id.clone(),
                now,
                owner,
                fingerprint.clone(),
                file_name,
                content,
                report.clone(),
            );
            self.job_store.create(&job).await?;
            info!(job_id = %job_id, fingerprint = %fingerprint, "Cache hit, answering synchronously");
            return Ok(SubmitOutcome {
                job_id,
                status: JobStatus::Complete,
                cache_hit: true,
                result: Some(report),
            });
        }

        let job = Job::new_queued(
            job_id.clone(),
            now,
            owner,
            fingerprint.clone(),
            file_name,
            content,
        );
        self.job_store.create(&job).await?;

        let body = MessageBody {
            job_id: job_id.clone(),
            code_hash: fingerprint.clone(),
            file_name: file_name.to_string(),
            file_content: content.to_string(),
        };
        let message_id = self.queue.enqueue(&body).await?;
        info!(
            job_id = %job_id,
            message_id = %message_id,
            fingerprint = %fingerprint,
            "Job enqueued"
        );

        Ok(SubmitOutcome {
            job_id,
            status: JobStatus::Queued,
            cache_hit: false,
            result: None,
        })
    }

    /// Read-through of the job store.
    pub async fn status(&self, job_id: &JobId) -> Result<Job> {
        self.job_store
            .get(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {} not found", job_id)))
    }

    /// Most recent jobs for one owner, newest first, capped at 50.
    pub async fn history(&self, owner: OwnerId, limit: i64) -> Result<Vec<JobSummary>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        self.job_store.history(owner, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::analyzer::mocks::MockAnalyzer;
    use crate::port::clock::mocks::{ManualClock, SeqIds};
    use crate::port::job_queue::mocks::InMemoryQueue;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::result_cache::mocks::{BrokenCache, InMemoryCache};

    fn service_with(
        cache: Arc<dyn ResultCache>,
        queue: Arc<InMemoryQueue>,
        store: Arc<InMemoryJobStore>,
    ) -> SubmissionService {
        SubmissionService::new(
            store,
            cache,
            queue,
            Arc::new(SeqIds::new("job")),
            Arc::new(ManualClock::new(1_000)),
            SubmissionConfig {
                max_content_bytes: Some(1024),
            },
        )
    }

    fn default_service() -> (SubmissionService, Arc<InMemoryQueue>, Arc<InMemoryJobStore>) {
        let time = Arc::new(ManualClock::new(1_000));
        let store = Arc::new(InMemoryJobStore::new(time));
        let queue = Arc::new(InMemoryQueue::new(3));
        let service = service_with(Arc::new(InMemoryCache::new()), queue.clone(), store.clone());
        (service, queue, store)
    }

    #[tokio::test]
    async fn empty_content_is_invalid_input() {
        let (service, _, _) = default_service();
        let err = service.submit("a.js", "", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn oversized_content_is_invalid_input() {
        let (service, _, _) = default_service();
        let big = "x".repeat(2048);
        let err = service.submit("a.js", &big, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn miss_creates_queued_job_and_enqueues() {
        let (service, queue, store) = default_service();
        let outcome = service.submit("a.js", "eval(x)\n", Some(1)).await.unwrap();
        assert_eq!(outcome.status, JobStatus::Queued);
        assert!(!outcome.cache_hit);
        assert!(outcome.result.is_none());
        assert_eq!(queue.main_depth(), 1);

        let job = store.get(&outcome.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.owner, Some(1));
    }

    #[tokio::test]
    async fn hit_answers_synchronously_and_writes_job_first() {
        let time = Arc::new(ManualClock::new(1_000));
        let store = Arc::new(InMemoryJobStore::new(time));
        let queue = Arc::new(InMemoryQueue::new(3));
        let cache = Arc::new(InMemoryCache::new());

        let fp = Fingerprint::of_bytes(b"cached content");
        let report = MockAnalyzer::empty_report("a.js");
        cache.put(&fp, &report).await.unwrap();

        let service = service_with(cache, queue.clone(), store.clone());
        let outcome = service.submit("a.js", "cached content", None).await.unwrap();

        assert_eq!(outcome.status, JobStatus::Complete);
        assert!(outcome.cache_hit);
        assert_eq!(outcome.result, Some(report.clone()));
        // Nothing was enqueued on the hit path.
        assert_eq!(queue.main_depth(), 0);

        // A status poll right after submit observes the completed job.
        let job = service.status(&outcome.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job.cache_hit);
        assert_eq!(job.processing_time_ms, Some(0));
        assert_eq!(job.result, Some(report));
    }

    #[tokio::test]
    async fn broken_cache_degrades_to_miss() {
        let time = Arc::new(ManualClock::new(1_000));
        let store = Arc::new(InMemoryJobStore::new(time));
        let queue = Arc::new(InMemoryQueue::new(3));
        let service = service_with(Arc::new(BrokenCache), queue.clone(), store);

        let outcome = service.submit("a.js", "some content", None).await.unwrap();
        assert_eq!(outcome.status, JobStatus::Queued);
        assert!(!outcome.cache_hit);
        assert_eq!(queue.main_depth(), 1);
    }

    #[tokio::test]
    async fn status_of_unknown_job_is_not_found() {
        let (service, _, _) = default_service();
        let err = service.status(&"missing".to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn history_is_capped_at_fifty() {
        let (service, _, store) = default_service();
        for i in 0..3 {
            service
                .submit("a.js", &format!("content {}", i), Some(9))
                .await
                .unwrap();
        }
        let rows = service.history(9, 1000).await.unwrap();
        assert_eq!(rows.len(), 3);
        // Limit is clamped, not an error.
        assert!(store.history(9, MAX_HISTORY_LIMIT).await.unwrap().len() <= 50);
    }
}
