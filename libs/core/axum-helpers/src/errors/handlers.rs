use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::{ErrorCode, error_response};

/// Handler for 404 Not Found errors.
///
/// This can be used as a fallback handler in your router.
pub async fn not_found() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "The requested resource was not found".to_string(),
        ErrorCode::NotFound,
    )
    .into_response()
}
