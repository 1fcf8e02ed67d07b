//! Retry-budget and dead-letter flows over the SQLite-backed transport:
//! redelivery, redrive into the DLQ, handler consumption, manual retry and
//! resolution.

use std::sync::Arc;

use codesift_analyzer::{AnalyzerConfig, CodeAnalyzer};
use codesift_core::application::worker::Worker;
use codesift_core::application::{DlqHandler, DlqService, SubmissionConfig, SubmissionService};
use codesift_core::domain::JobStatus;
use codesift_core::port::analyzer::mocks::MockAnalyzer;
use codesift_core::port::analyzer::Analyzer;
use codesift_core::port::clock::mocks::{ManualClock, SeqIds};
use codesift_core::port::QueueConfig;
use codesift_infra_sqlite::{
    create_pool, run_migrations, SqliteDlqStore, SqliteJobQueue, SqliteJobStore, SqliteResultCache,
};

struct DlqPipeline {
    time: Arc<ManualClock>,
    submission: SubmissionService,
    worker: Worker,
    handler: DlqHandler,
    service: DlqService,
}

async fn dlq_pipeline(analyzer: Arc<dyn Analyzer>) -> DlqPipeline {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let time = Arc::new(ManualClock::new(1_000_000));
    let ids = Arc::new(SeqIds::new("id"));
    let queue_config = QueueConfig {
        visibility_seconds: 1,
        max_receive_count: 3,
        long_poll_seconds: 0,
        ..QueueConfig::default()
    };

    let store = Arc::new(SqliteJobStore::new(pool.clone(), time.clone()));
    let cache = Arc::new(SqliteResultCache::new(
        pool.clone(),
        time.clone(),
        Default::default(),
    ));
    let queue = Arc::new(SqliteJobQueue::new(
        pool.clone(),
        time.clone(),
        ids.clone(),
        queue_config.clone(),
    ));
    let dlq_store = Arc::new(SqliteDlqStore::new(pool.clone(), time.clone()));

    let submission = SubmissionService::new(
        store.clone(),
        cache.clone(),
        queue.clone(),
        ids.clone(),
        time.clone(),
        SubmissionConfig::default(),
    );
    let worker = Worker::new(
        queue.clone(),
        store.clone(),
        cache,
        dlq_store.clone(),
        analyzer,
        ids.clone(),
        time.clone(),
        queue_config.clone(),
    );
    let handler = DlqHandler::new(
        queue.clone(),
        store.clone(),
        dlq_store.clone(),
        ids,
        time.clone(),
        queue_config,
    );
    let service = DlqService::new(queue.clone(), store, dlq_store);

    DlqPipeline {
        time,
        submission,
        worker,
        handler,
        service,
    }
}

fn force_fail_analyzer() -> Arc<dyn Analyzer> {
    Arc::new(CodeAnalyzer::new(AnalyzerConfig {
        allow_force_fail: true,
        ..AnalyzerConfig::default()
    }))
}

/// Drive one message through its full retry budget (3 failed receives),
/// letting the visibility lease expire between attempts.
async fn exhaust_retries(px: &DlqPipeline) {
    for _ in 0..3 {
        assert!(px.worker.poll_once().await.unwrap());
        px.time.advance(1_001);
    }
}

#[tokio::test]
async fn force_fail_exhausts_retries_and_dead_letters() {
    let px = dlq_pipeline(force_fail_analyzer()).await;
    let outcome = px
        .submission
        .submit("force_fail.js", "x", None)
        .await
        .unwrap();

    // First failed attempt: the job is retrying and the message stays.
    assert!(px.worker.poll_once().await.unwrap());
    let job = px.submission.status(&outcome.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Retrying);
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.is_some());

    // Two more failures exhaust the budget; the terminal attempt flips the
    // job to dlq and records the entry.
    px.time.advance(1_001);
    for _ in 0..2 {
        assert!(px.worker.poll_once().await.unwrap());
        px.time.advance(1_001);
    }
    let job = px.submission.status(&outcome.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Dlq);

    // The next receive attempt routes the message to the companion DLQ,
    // where the handler consumes it exactly once.
    assert!(!px.worker.poll_once().await.unwrap());
    assert!(px.handler.poll_once().await.unwrap());
    assert!(!px.handler.poll_once().await.unwrap());

    let entries = px.service.list(None, 50, 0).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].job_id, outcome.job_id);
    assert_eq!(entries[0].receive_count, 3);
    assert!(!entries[0].resolved);

    let job = px.submission.status(&outcome.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Dlq);
    assert_eq!(job.dlq_message_id.as_deref(), Some(entries[0].message_id.as_str()));

    let stats = px.service.stats().await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.unresolved, 1);
    assert_eq!(stats.unique_jobs, 1);
}

#[tokio::test]
async fn dlq_retry_runs_to_completion_and_counts_the_retry() {
    // Fails the first three analysis calls, then succeeds: the original
    // message dead-letters, the manual retry completes.
    let px = dlq_pipeline(Arc::new(MockAnalyzer::new_fail_times(3, "transient"))).await;
    let outcome = px.submission.submit("a.js", "x", None).await.unwrap();

    exhaust_retries(&px).await;
    assert!(!px.worker.poll_once().await.unwrap());
    assert!(px.handler.poll_once().await.unwrap());

    let entry = px.service.list(None, 50, 0).await.unwrap()[0].clone();
    let updated = px.service.retry(&entry.id).await.unwrap();
    assert_eq!(updated.retry_count, 1);

    let job = px.submission.status(&outcome.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Retrying);

    // Fresh message, fresh receive count; the fourth analysis succeeds.
    assert!(px.worker.poll_once().await.unwrap());
    let job = px.submission.status(&outcome.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert!(job.result.is_some());

    let entry = px.service.get(&entry.id).await.unwrap();
    assert_eq!(entry.retry_count, 1);
}

#[tokio::test]
async fn failed_retry_dead_letters_again_under_a_new_message() {
    let px = dlq_pipeline(force_fail_analyzer()).await;
    let outcome = px
        .submission
        .submit("force_fail.js", "x", None)
        .await
        .unwrap();

    exhaust_retries(&px).await;
    assert!(!px.worker.poll_once().await.unwrap());
    assert!(px.handler.poll_once().await.unwrap());

    let first = px.service.list(None, 50, 0).await.unwrap()[0].clone();
    px.service.retry(&first.id).await.unwrap();

    // The requeued message fails through its own budget and dead-letters
    // under a new message id.
    exhaust_retries(&px).await;
    assert!(!px.worker.poll_once().await.unwrap());
    assert!(px.handler.poll_once().await.unwrap());

    let stats = px.service.stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.unique_jobs, 1);

    let first = px.service.get(&first.id).await.unwrap();
    assert_eq!(first.retry_count, 1);

    let job = px.submission.status(&outcome.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Dlq);
}

#[tokio::test]
async fn resolve_is_idempotent() {
    let px = dlq_pipeline(force_fail_analyzer()).await;
    px.submission
        .submit("force_fail.js", "x", None)
        .await
        .unwrap();

    exhaust_retries(&px).await;
    assert!(!px.worker.poll_once().await.unwrap());
    assert!(px.handler.poll_once().await.unwrap());

    let entry = px.service.list(None, 50, 0).await.unwrap()[0].clone();
    let resolved = px.service.resolve(&entry.id, "known bad input").await.unwrap();
    assert!(resolved.resolved);
    let stamped_at = resolved.resolved_at;

    let again = px.service.resolve(&entry.id, "known bad input").await.unwrap();
    assert!(again.resolved);
    assert_eq!(again.resolved_at, stamped_at);
    assert_eq!(again.resolution_reason.as_deref(), Some("known bad input"));

    let stats = px.service.stats().await.unwrap();
    assert_eq!(stats.unresolved, 0);

    // Resolved entries filter out of the unresolved listing.
    assert!(px.service.list(Some(false), 50, 0).await.unwrap().is_empty());
    assert_eq!(px.service.list(Some(true), 50, 0).await.unwrap().len(), 1);
}
