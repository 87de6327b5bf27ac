//! User event processor for the stream worker.
//!
//! Maps each decoded [`UserEvent`] to task store calls:
//! - `user_created`: create the starter tasks for the user
//! - `user_deleted`: delete every task the user owns
//! - anything else: logged and skipped

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stream_worker::{StreamError, StreamProcessor};
use strum::{AsRefStr, Display, EnumString};
use tracing::{error, info, instrument, warn};

use crate::error::TaskResult;
use crate::events::{UserEvent, UserEventKind};
use crate::repository::TaskRepository;
use crate::seeds::seed_tasks_for;

/// How the starter tasks of a new user are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    /// One insert per task. A failed insert neither blocks the others nor
    /// rolls them back.
    #[default]
    Independent,
    /// All inserts in one transaction.
    Atomic,
}

/// Outcome of seeding one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub created: usize,
    pub failed: usize,
}

impl SeedReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Applies user lifecycle events to the task store.
pub struct UserEventProcessor<R: TaskRepository> {
    repository: Arc<R>,
    seed_mode: SeedMode,
}

impl<R: TaskRepository> Clone for UserEventProcessor<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            seed_mode: self.seed_mode,
        }
    }
}

impl<R: TaskRepository> UserEventProcessor<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            seed_mode: SeedMode::default(),
        }
    }

    pub fn with_seed_mode(mut self, seed_mode: SeedMode) -> Self {
        self.seed_mode = seed_mode;
        self
    }

    pub fn seed_mode(&self) -> SeedMode {
        self.seed_mode
    }

    /// Create the starter tasks for `user_id`.
    ///
    /// In [`SeedMode::Independent`] store failures are logged per task and
    /// counted in the report; only [`SeedMode::Atomic`] returns them as errors.
    #[instrument(skip(self), fields(seed_mode = %self.seed_mode))]
    pub async fn on_user_created(&self, user_id: i64) -> TaskResult<SeedReport> {
        let seeds = seed_tasks_for(user_id);
        let total = seeds.len();

        let report = match self.seed_mode {
            SeedMode::Independent => {
                let mut report = SeedReport::default();
                for seed in seeds {
                    let title = seed.title.clone();
                    match self.repository.create(seed).await {
                        Ok(task) => {
                            report.created += 1;
                            info!(task_id = task.id, user_id, title = %title, "Created seed task");
                        }
                        Err(e) => {
                            report.failed += 1;
                            error!(user_id, title = %title, error = %e, "Failed to create seed task");
                        }
                    }
                }
                report
            }
            SeedMode::Atomic => {
                let created = self.repository.create_many(seeds).await?;
                SeedReport {
                    created: created.len(),
                    failed: 0,
                }
            }
        };

        if report.is_complete() {
            info!(user_id, created = report.created, "Seeded tasks for new user");
        } else {
            warn!(
                user_id,
                created = report.created,
                failed = report.failed,
                total,
                "User was left with a partial seed set"
            );
        }

        Ok(report)
    }

    /// Delete every task of `user_id`. Zero deleted is a success.
    #[instrument(skip(self))]
    pub async fn on_user_deleted(&self, user_id: i64) -> TaskResult<u64> {
        let deleted = self.repository.delete_by_owner(user_id).await?;
        info!(user_id, deleted, "Deleted tasks of removed user");
        Ok(deleted)
    }

    /// Route one event to its handler.
    pub async fn dispatch(&self, event: &UserEvent) -> Result<(), StreamError> {
        let Some(user_id) = event.owner_id() else {
            return Err(StreamError::permanent(format!(
                "user_id {} does not fit the tasks.user_id column",
                event.user_id
            )));
        };

        match &event.event_type {
            UserEventKind::Created => {
                let report = self
                    .on_user_created(user_id)
                    .await
                    .map_err(|e| StreamError::transient(format!("seeding user {user_id}: {e}")))?;

                if !report.is_complete() {
                    return Err(StreamError::transient(format!(
                        "{} of {} seed tasks failed for user {}",
                        report.failed,
                        report.created + report.failed,
                        user_id
                    )));
                }
                Ok(())
            }
            UserEventKind::Deleted => {
                self.on_user_deleted(user_id)
                    .await
                    .map_err(|e| StreamError::transient(format!("deleting tasks of user {user_id}: {e}")))?;
                Ok(())
            }
            UserEventKind::Unknown(tag) => {
                info!(event_type = %tag, user_id, "Ignoring unhandled event type");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<R: TaskRepository + 'static> StreamProcessor<UserEvent> for UserEventProcessor<R> {
    async fn process(&self, event: &UserEvent) -> Result<(), StreamError> {
        self.dispatch(event).await
    }

    fn name(&self) -> &'static str {
        "UserEventProcessor"
    }
}
