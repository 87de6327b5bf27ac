//! In-memory [`TaskRepository`] for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::error::TaskResult;
use crate::models::{CreateTask, Task, UpdateTask};
use crate::repository::TaskRepository;

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<BTreeMap<i64, Task>>,
    next_id: AtomicI64,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(&self, input: CreateTask) -> Task {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        Task {
            id,
            title: input.title,
            description: input.description,
            completed: input.completed,
            user_id: input.user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, input: CreateTask) -> TaskResult<Task> {
        let task = self.build(input);
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn create_many(&self, inputs: Vec<CreateTask>) -> TaskResult<Vec<Task>> {
        let mut tasks = self.tasks.write().await;
        let created: Vec<Task> = inputs.into_iter().map(|input| self.build(input)).collect();
        for task in &created {
            tasks.insert(task.id, task.clone());
        }
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> TaskResult<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn list(&self) -> TaskResult<Vec<Task>> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }

    async fn list_by_owner(&self, user_id: i64) -> TaskResult<Vec<Task>> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update(&self, id: i64, input: UpdateTask) -> TaskResult<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks.get_mut(&id).map(|task| {
            task.apply_update(input);
            task.clone()
        }))
    }

    async fn delete(&self, id: i64) -> TaskResult<bool> {
        Ok(self.tasks.write().await.remove(&id).is_some())
    }

    async fn delete_by_owner(&self, user_id: i64) -> TaskResult<u64> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, t| t.user_id != user_id);
        Ok((before - tasks.len()) as u64)
    }

    async fn count_by_owner(&self, user_id: i64) -> TaskResult<u64> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_assigned_in_order() {
        let repo = InMemoryTaskRepository::new();
        let a = repo.create(CreateTask::new(1, "a", "")).await.unwrap();
        let b = repo.create(CreateTask::new(1, "b", "")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
    }

    #[tokio::test]
    async fn test_delete_by_owner_scope() {
        let repo = InMemoryTaskRepository::new();
        repo.create_many(vec![
            CreateTask::new(1, "a", ""),
            CreateTask::new(1, "b", ""),
            CreateTask::new(2, "c", ""),
        ])
        .await
        .unwrap();

        assert_eq!(repo.delete_by_owner(1).await.unwrap(), 2);
        assert_eq!(repo.delete_by_owner(1).await.unwrap(), 0);
        assert_eq!(repo.count_by_owner(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let repo = InMemoryTaskRepository::new();
        let updated = repo.update(5, UpdateTask::default()).await.unwrap();
        assert!(updated.is_none());
    }
}
