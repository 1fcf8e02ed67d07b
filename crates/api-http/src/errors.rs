use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use codesift_core::error::AppError;

/// Map an application error onto the wire contract: 400 for rejected
/// input, 404 for unknown ids, 500 otherwise, always `{"error": ...}`.
pub fn to_response(err: AppError) -> axum::response::Response {
    let (status, message) = match &err {
        AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        _ => {
            tracing::error!(error = %err, "Request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    };
    json_error(status, message)
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": message.into(),
        })),
    )
        .into_response()
}
