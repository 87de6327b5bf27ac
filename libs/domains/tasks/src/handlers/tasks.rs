use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_helpers::{IdPath, ValidatedJson};
use std::sync::Arc;

use crate::error::TaskResult;
use crate::models::{CreateTask, Task, UpdateTask};
use crate::repository::TaskRepository;
use crate::service::TaskService;

/// List all tasks
#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "tasks",
    responses(
        (status = 200, description = "List of tasks", body = Vec<Task>),
        (status = 500, response = axum_helpers::errors::responses::InternalServerErrorResponse)
    )
)]
pub async fn list_tasks<R: TaskRepository>(
    State(service): State<Arc<TaskService<R>>>,
) -> TaskResult<Json<Vec<Task>>> {
    let tasks = service.list_tasks().await?;
    Ok(Json(tasks))
}

/// Create a new task
#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "tasks",
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task created successfully", body = Task),
        (status = 400, response = axum_helpers::errors::responses::BadRequestValidationResponse),
        (status = 500, response = axum_helpers::errors::responses::InternalServerErrorResponse)
    )
)]
pub async fn create_task<R: TaskRepository>(
    State(service): State<Arc<TaskService<R>>>,
    ValidatedJson(input): ValidatedJson<CreateTask>,
) -> TaskResult<impl IntoResponse> {
    let task = service.create_task(input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Get a task by ID
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = i64, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task found", body = Task),
        (status = 400, response = axum_helpers::errors::responses::BadRequestIdResponse),
        (status = 404, response = axum_helpers::errors::responses::NotFoundResponse),
        (status = 500, response = axum_helpers::errors::responses::InternalServerErrorResponse)
    )
)]
pub async fn get_task<R: TaskRepository>(
    State(service): State<Arc<TaskService<R>>>,
    IdPath(id): IdPath,
) -> TaskResult<Json<Task>> {
    let task = service.get_task(id).await?;
    Ok(Json(task))
}

/// Update the fields present in the body
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = i64, Path, description = "Task ID")
    ),
    request_body = UpdateTask,
    responses(
        (status = 200, description = "Task updated successfully", body = Task),
        (status = 400, response = axum_helpers::errors::responses::BadRequestValidationResponse),
        (status = 404, response = axum_helpers::errors::responses::NotFoundResponse),
        (status = 500, response = axum_helpers::errors::responses::InternalServerErrorResponse)
    )
)]
pub async fn update_task<R: TaskRepository>(
    State(service): State<Arc<TaskService<R>>>,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateTask>,
) -> TaskResult<Json<Task>> {
    let task = service.update_task(id, input).await?;
    Ok(Json(task))
}

/// Delete a task
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = i64, Path, description = "Task ID")
    ),
    responses(
        (status = 204, description = "Task deleted successfully"),
        (status = 400, response = axum_helpers::errors::responses::BadRequestIdResponse),
        (status = 404, response = axum_helpers::errors::responses::NotFoundResponse),
        (status = 500, response = axum_helpers::errors::responses::InternalServerErrorResponse)
    )
)]
pub async fn delete_task<R: TaskRepository>(
    State(service): State<Arc<TaskService<R>>>,
    IdPath(id): IdPath,
) -> TaskResult<StatusCode> {
    service.delete_task(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List the tasks of one user
#[utoipa::path(
    get,
    path = "/api/tasks/user/{user_id}",
    tag = "tasks",
    params(
        ("user_id" = i64, Path, description = "Owning user ID")
    ),
    responses(
        (status = 200, description = "Tasks owned by the user, possibly none", body = Vec<Task>),
        (status = 400, response = axum_helpers::errors::responses::BadRequestIdResponse),
        (status = 500, response = axum_helpers::errors::responses::InternalServerErrorResponse)
    )
)]
pub async fn list_tasks_by_owner<R: TaskRepository>(
    State(service): State<Arc<TaskService<R>>>,
    IdPath(user_id): IdPath,
) -> TaskResult<Json<Vec<Task>>> {
    let tasks = service.list_tasks_by_owner(user_id).await?;
    Ok(Json(tasks))
}
