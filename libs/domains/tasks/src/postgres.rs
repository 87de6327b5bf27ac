use async_trait::async_trait;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::{debug, info};

use crate::{
    entity,
    error::TaskResult,
    models::{CreateTask, Task, UpdateTask},
    repository::TaskRepository,
};

/// Statements that create the tasks table and its owner index if missing.
const SCHEMA: [&str; 2] = [
    r#"CREATE TABLE IF NOT EXISTS tasks (
        id BIGSERIAL PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        completed BOOLEAN NOT NULL DEFAULT FALSE,
        user_id BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_tasks_user_id ON tasks (user_id)",
];

#[derive(Clone)]
pub struct PgTaskRepository {
    db: DatabaseConnection,
}

impl PgTaskRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Create the table and index when they do not exist yet. Safe to run on
    /// every start.
    pub async fn ensure_schema(&self) -> Result<(), DbErr> {
        for statement in SCHEMA {
            self.db.execute_unprepared(statement).await?;
        }
        info!("Task schema ready");
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn create(&self, input: CreateTask) -> TaskResult<Task> {
        let active_model: entity::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;

        info!(task_id = model.id, user_id = model.user_id, "Created task");
        Ok(model.into())
    }

    async fn create_many(&self, inputs: Vec<CreateTask>) -> TaskResult<Vec<Task>> {
        let txn = self.db.begin().await?;

        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let active_model: entity::ActiveModel = input.into();
            // An early return drops `txn`, which rolls it back
            let model = active_model.insert(&txn).await?;
            created.push(Task::from(model));
        }

        txn.commit().await?;
        info!(count = created.len(), "Created tasks in one transaction");
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> TaskResult<Option<Task>> {
        let model = entity::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list(&self) -> TaskResult<Vec<Task>> {
        let models = entity::Entity::find()
            .order_by_asc(entity::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn list_by_owner(&self, user_id: i64) -> TaskResult<Vec<Task>> {
        let models = entity::Entity::find()
            .filter(entity::Column::UserId.eq(user_id))
            .order_by_asc(entity::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update(&self, id: i64, input: UpdateTask) -> TaskResult<Option<Task>> {
        let Some(model) = entity::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut task: Task = model.clone().into();
        task.apply_update(input.clone());

        // Only present fields become `Set`; the rest stay `Unchanged` and are
        // left out of the UPDATE statement.
        let mut active_model = model.into_active_model();
        if input.title.is_some() {
            active_model.title = Set(task.title);
        }
        if input.description.is_some() {
            active_model.description = Set(task.description);
        }
        if let Some(completed) = input.completed {
            active_model.completed = Set(completed);
        }
        if let Some(user_id) = input.user_id {
            active_model.user_id = Set(user_id);
        }
        active_model.updated_at = Set(task.updated_at.into());

        match active_model.update(&self.db).await {
            Ok(updated) => {
                info!(task_id = id, "Updated task");
                Ok(Some(updated.into()))
            }
            // Deleted between the read and the write
            Err(DbErr::RecordNotUpdated) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: i64) -> TaskResult<bool> {
        let result = entity::Entity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected > 0 {
            info!(task_id = id, "Deleted task");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn delete_by_owner(&self, user_id: i64) -> TaskResult<u64> {
        let result = entity::Entity::delete_many()
            .filter(entity::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        debug!(user_id, rows = result.rows_affected, "Deleted tasks by owner");
        Ok(result.rows_affected)
    }

    async fn count_by_owner(&self, user_id: i64) -> TaskResult<u64> {
        let count = entity::Entity::find()
            .filter(entity::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}
