//! Numeric path parameter extractor.

use crate::errors::AppError;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
    response::{IntoResponse, Response},
};

/// Extractor for a single positive `i64` path parameter.
///
/// Input that is not a number of at least 1 is rejected with 400
/// `INVALID_ID` instead of axum's plain-text path rejection.
///
/// ```ignore
/// async fn get_task(IdPath(id): IdPath) -> String {
///     format!("Task {}", id)
/// }
///
/// let app = Router::new().route("/tasks/{id}", get(get_task));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdPath(pub i64);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| e.into_response())?;

        match raw.trim().parse::<i64>() {
            Ok(id) if id >= 1 => Ok(IdPath(id)),
            _ => Err(AppError::InvalidId(raw).into_response()),
        }
    }
}
