//! HTTP API application wiring (Axum router).
//!
//! Layout:
//! - `routes/`: HTTP routes + handlers (one file per surface area)
//! - `types.rs`: request/response DTOs and JSON mapping
//! - `errors.rs`: consistent `{"error": ...}` responses

pub mod errors;
pub mod routes;
pub mod server;
pub mod types;

use std::sync::Arc;

use axum::{Extension, Router};

use codesift_core::application::{DlqService, SubmissionService};
use codesift_core::port::{Clock, JobStore};

pub use server::{HttpServer, HttpServerConfig};

/// Shared handler context, injected as an Extension layer.
pub struct ApiContext {
    pub submission: SubmissionService,
    pub dlq: DlqService,
    pub job_store: Arc<dyn JobStore>,
    pub clock: Arc<dyn Clock>,
}

/// Build the full HTTP router (public entrypoint used by the daemon).
pub fn build_router(context: Arc<ApiContext>) -> Router {
    routes::router().layer(Extension(context))
}
