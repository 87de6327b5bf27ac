use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::{CreateTask, Task};

/// Sea-ORM Entity for Tasks table
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub completed: bool,
    pub user_id: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// Conversion from Sea-ORM Model to domain Task
impl From<Model> for Task {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            completed: model.completed,
            user_id: model.user_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

// The id is left to the BIGSERIAL sequence
impl From<CreateTask> for ActiveModel {
    fn from(input: CreateTask) -> Self {
        let now = chrono::Utc::now();
        ActiveModel {
            id: NotSet,
            title: Set(input.title),
            description: Set(input.description),
            completed: Set(input.completed),
            user_id: Set(input.user_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
    }
}
