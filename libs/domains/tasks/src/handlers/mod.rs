mod tasks;

use axum::{Router, routing::get};
use axum_helpers::ErrorResponse;
use axum_helpers::errors::responses::{
    BadRequestIdResponse, BadRequestValidationResponse, InternalServerErrorResponse,
    NotFoundResponse,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::models::{CreateTask, Task, UpdateTask};
use crate::repository::TaskRepository;
use crate::service::TaskService;

pub use tasks::{
    create_task, delete_task, get_task, list_tasks, list_tasks_by_owner, update_task,
};

/// OpenAPI documentation for the Tasks API
#[derive(OpenApi)]
#[openapi(
    paths(
        tasks::list_tasks,
        tasks::create_task,
        tasks::get_task,
        tasks::update_task,
        tasks::delete_task,
        tasks::list_tasks_by_owner,
    ),
    components(
        schemas(Task, CreateTask, UpdateTask, ErrorResponse),
        responses(
            BadRequestIdResponse,
            BadRequestValidationResponse,
            InternalServerErrorResponse,
            NotFoundResponse,
        )
    ),
    tags(
        (name = "tasks", description = "Per-user task lists")
    )
)]
pub struct TasksApiDoc;

/// Routes under `/api/tasks`.
///
/// The collection answers with and without the trailing slash.
pub fn router<R: TaskRepository + 'static>(service: TaskService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route(
            "/api/tasks",
            get(tasks::list_tasks).post(tasks::create_task),
        )
        .route(
            "/api/tasks/",
            get(tasks::list_tasks).post(tasks::create_task),
        )
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/api/tasks/user/{user_id}", get(tasks::list_tasks_by_owner))
        .with_state(shared_service)
}
