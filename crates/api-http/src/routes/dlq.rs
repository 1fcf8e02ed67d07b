use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::response::Response;
use axum::Json;

use codesift_core::domain::DlqStats;

use crate::errors::to_response;
use crate::types::{DlqEntryResponse, DlqListQuery, ResolveRequest};
use crate::ApiContext;

pub async fn list(
    Extension(ctx): Extension<Arc<ApiContext>>,
    Query(query): Query<DlqListQuery>,
) -> Result<Json<Vec<DlqEntryResponse>>, Response> {
    let entries = ctx
        .dlq
        .list(query.resolved, query.limit, query.offset)
        .await
        .map_err(to_response)?;
    Ok(Json(entries.into_iter().map(DlqEntryResponse::from).collect()))
}

pub async fn stats(
    Extension(ctx): Extension<Arc<ApiContext>>,
) -> Result<Json<DlqStats>, Response> {
    let stats = ctx.dlq.stats().await.map_err(to_response)?;
    Ok(Json(stats))
}

pub async fn get_entry(
    Extension(ctx): Extension<Arc<ApiContext>>,
    Path(id): Path<String>,
) -> Result<Json<DlqEntryResponse>, Response> {
    let entry = ctx.dlq.get(&id).await.map_err(to_response)?;
    Ok(Json(entry.into()))
}

pub async fn retry(
    Extension(ctx): Extension<Arc<ApiContext>>,
    Path(id): Path<String>,
) -> Result<Json<DlqEntryResponse>, Response> {
    let entry = ctx.dlq.retry(&id).await.map_err(to_response)?;
    Ok(Json(entry.into()))
}

pub async fn resolve(
    Extension(ctx): Extension<Arc<ApiContext>>,
    Path(id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<DlqEntryResponse>, Response> {
    let entry = ctx
        .dlq
        .resolve(&id, &request.reason)
        .await
        .map_err(to_response)?;
    Ok(Json(entry.into()))
}
