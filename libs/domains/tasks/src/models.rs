use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A single item on a user's task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Task {
    /// Store-assigned identifier
    pub id: i64,
    /// Task title
    pub title: String,
    /// Free-text description, empty when not given
    pub description: String,
    /// Whether the task is completed
    pub completed: bool,
    /// Owning user. Not checked against any user registry.
    pub user_id: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification, never moves backwards
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating a new task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTask {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[validate(range(min = 1))]
    pub user_id: i64,
}

impl CreateTask {
    pub fn new(user_id: i64, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            completed: false,
            user_id,
        }
    }
}

/// DTO for updating an existing task
///
/// Every field is optional. An absent field is left untouched; a present one
/// is written even when it holds `false` or an empty description.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub user_id: Option<i64>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.user_id.is_none()
    }
}

impl Task {
    /// Apply updates from UpdateTask DTO
    pub fn apply_update(&mut self, update: UpdateTask) {
        self.apply_update_at(update, Utc::now());
    }

    /// Apply `update` as if it happened at `now`. `updated_at` never decreases,
    /// even when the clock steps back.
    pub fn apply_update_at(&mut self, update: UpdateTask, now: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(user_id) = update.user_id {
            self.user_id = user_id;
        }
        self.updated_at = now.max(self.updated_at);
    }
}
