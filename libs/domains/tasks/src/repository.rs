use async_trait::async_trait;

use crate::error::TaskResult;
use crate::models::{CreateTask, Task, UpdateTask};

/// Repository trait for Task persistence
///
/// Every call is atomic on its own. Nothing here spans more than one call
/// except [`TaskRepository::create_many`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new task
    async fn create(&self, input: CreateTask) -> TaskResult<Task>;

    /// Create all tasks in one transaction, or none of them
    async fn create_many(&self, inputs: Vec<CreateTask>) -> TaskResult<Vec<Task>>;

    /// Get a task by ID
    async fn get_by_id(&self, id: i64) -> TaskResult<Option<Task>>;

    /// List every task, oldest first
    async fn list(&self) -> TaskResult<Vec<Task>>;

    /// List the tasks owned by one user, oldest first
    async fn list_by_owner(&self, user_id: i64) -> TaskResult<Vec<Task>>;

    /// Update the fields present in `input`. `None` when the task does not exist.
    async fn update(&self, id: i64, input: UpdateTask) -> TaskResult<Option<Task>>;

    /// Delete a task by ID. `false` when it did not exist.
    async fn delete(&self, id: i64) -> TaskResult<bool>;

    /// Delete every task owned by `user_id`, returning how many went
    async fn delete_by_owner(&self, user_id: i64) -> TaskResult<u64>;

    /// Count tasks owned by `user_id`
    async fn count_by_owner(&self, user_id: i64) -> TaskResult<u64>;
}
