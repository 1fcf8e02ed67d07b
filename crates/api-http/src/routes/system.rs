use std::sync::Arc;

use axum::extract::Extension;
use axum::response::Response;
use axum::Json;

use codesift_core::port::{Clock, JobStore};

use crate::errors::to_response;
use crate::types::{HealthResponse, StatsResponse};
use crate::ApiContext;

fn hit_rate(hits: i64, misses: i64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

pub async fn health(
    Extension(ctx): Extension<Arc<ApiContext>>,
) -> Result<Json<HealthResponse>, Response> {
    let counts = ctx.job_store.counts().await.map_err(to_response)?;
    Ok(Json(HealthResponse {
        status: "ok",
        timestamp: ctx.clock.now_ms(),
        cache_hit_rate: hit_rate(counts.cache_hits, counts.cache_misses),
    }))
}

pub async fn stats(
    Extension(ctx): Extension<Arc<ApiContext>>,
) -> Result<Json<StatsResponse>, Response> {
    let counts = ctx.job_store.counts().await.map_err(to_response)?;
    Ok(Json(StatsResponse {
        cache_hits: counts.cache_hits,
        cache_misses: counts.cache_misses,
        cache_hit_rate: hit_rate(counts.cache_hits, counts.cache_misses),
        // Queue depth estimated from the job table (status index).
        queue_depth: counts.queued + counts.retrying,
        active_workers: counts.processing,
        total_jobs: counts.total,
        queued_jobs: counts.queued,
        processing_jobs: counts.processing,
        retrying_jobs: counts.retrying,
        complete_jobs: counts.complete,
        dlq_jobs: counts.dlq,
    }))
}
