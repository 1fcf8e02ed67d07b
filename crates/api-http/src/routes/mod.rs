pub mod dlq;
pub mod reviews;
pub mod system;

use axum::routing::{get, post};
use axum::Router;

pub fn router() -> Router {
    Router::new()
        .route("/reviews/submit", post(reviews::submit))
        .route("/reviews/status/:job_id", get(reviews::status))
        .route("/reviews/history", get(reviews::history))
        .route("/dlq", get(dlq::list))
        .route("/dlq/stats", get(dlq::stats))
        .route("/dlq/:id", get(dlq::get_entry))
        .route("/dlq/:id/retry", post(dlq::retry))
        .route("/dlq/:id/resolve", post(dlq::resolve))
        .route("/health", get(system::health))
        .route("/stats", get(system::stats))
}
