use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

use crate::error::{TaskError, TaskResult};
use crate::models::{CreateTask, Task, UpdateTask};
use crate::repository::TaskRepository;

/// Service layer for Task business logic
pub struct TaskService<R: TaskRepository> {
    repository: Arc<R>,
}

impl<R: TaskRepository> Clone for TaskService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repository: R) -> Self {
        Self::from_arc(Arc::new(repository))
    }

    /// Share a repository with other components, e.g. the event processor.
    pub fn from_arc(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Create a new task with validation
    #[instrument(skip(self, input), fields(task_title = %input.title, user_id = input.user_id))]
    pub async fn create_task(&self, input: CreateTask) -> TaskResult<Task> {
        input.validate()?;
        self.repository.create(input).await
    }

    /// Get a task by ID
    #[instrument(skip(self))]
    pub async fn get_task(&self, id: i64) -> TaskResult<Task> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(TaskError::NotFound(id))
    }

    pub async fn list_tasks(&self) -> TaskResult<Vec<Task>> {
        self.repository.list().await
    }

    /// Tasks owned by `user_id`; empty when the user has none
    #[instrument(skip(self))]
    pub async fn list_tasks_by_owner(&self, user_id: i64) -> TaskResult<Vec<Task>> {
        self.repository.list_by_owner(user_id).await
    }

    /// Update a task
    #[instrument(skip(self, input))]
    pub async fn update_task(&self, id: i64, input: UpdateTask) -> TaskResult<Task> {
        input.validate()?;

        self.repository
            .update(id, input)
            .await?
            .ok_or(TaskError::NotFound(id))
    }

    /// Delete a task
    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: i64) -> TaskResult<()> {
        let deleted = self.repository.delete(id).await?;

        if !deleted {
            return Err(TaskError::NotFound(id));
        }

        Ok(())
    }
}
