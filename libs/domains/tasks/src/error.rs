use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(i64),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type TaskResult<T> = Result<T, TaskError>;

/// Convert TaskError to AppError for standardized error responses
impl From<TaskError> for AppError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound(id) => AppError::NotFound(format!("Task {} not found", id)),
            TaskError::Validation(msg) => AppError::BadRequest(msg),
            TaskError::Internal(msg) => AppError::InternalServerError(msg),
            TaskError::Database(msg) => {
                AppError::InternalServerError(format!("Database error: {}", msg))
            }
        }
    }
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl From<sea_orm::DbErr> for TaskError {
    fn from(err: sea_orm::DbErr) -> Self {
        TaskError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for TaskError {
    fn from(err: validator::ValidationErrors) -> Self {
        TaskError::Validation(err.to_string())
    }
}
