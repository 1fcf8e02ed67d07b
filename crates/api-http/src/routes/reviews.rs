use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::response::Response;
use axum::Json;

use codesift_core::domain::JobStatus;

use crate::errors::to_response;
use crate::types::{
    HistoryEntry, HistoryQuery, StatusResponse, SubmitRequest, SubmitResponse,
};
use crate::ApiContext;

pub async fn submit(
    Extension(ctx): Extension<Arc<ApiContext>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, Response> {
    let outcome = ctx
        .submission
        .submit(&request.file_name, &request.file_content, request.owner)
        .await
        .map_err(to_response)?;

    let message = match outcome.status {
        JobStatus::Complete => None,
        _ => Some("review queued; poll the status endpoint".to_string()),
    };

    Ok(Json(SubmitResponse {
        job_id: outcome.job_id,
        status: outcome.status,
        cache_hit: outcome.cache_hit,
        result: outcome.result,
        message,
    }))
}

pub async fn status(
    Extension(ctx): Extension<Arc<ApiContext>>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, Response> {
    let job = ctx.submission.status(&job_id).await.map_err(to_response)?;
    Ok(Json(job.into()))
}

pub async fn history(
    Extension(ctx): Extension<Arc<ApiContext>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, Response> {
    let rows = ctx
        .submission
        .history(query.owner, query.limit)
        .await
        .map_err(to_response)?;
    Ok(Json(rows.into_iter().map(HistoryEntry::from).collect()))
}
