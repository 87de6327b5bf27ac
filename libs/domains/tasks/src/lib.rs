//! Tasks Domain
//!
//! Per-user task lists, written from two independent paths:
//! - the REST API ([`handlers`]) doing direct CRUD
//! - the [`UserEventProcessor`], applying user lifecycle events from the
//!   `user-events` stream
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────────────┐
//! │  Handlers   │   │ UserEventProcessor │  ← HTTP / stream worker
//! └──────┬──────┘   └─────────┬──────────┘
//!        │                    │
//! ┌──────▼──────┐             │
//! │   Service   │             │            ← Validation
//! └──────┬──────┘             │
//!        │                    │
//! ┌──────▼────────────────────▼──────┐
//! │          TaskRepository          │     ← Postgres or in-memory
//! └──────────────────────────────────┘
//! ```
//!
//! Both paths get the same repository handle at construction time.
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_tasks::{PgTaskRepository, TaskService, UserEventProcessor};
//! use sea_orm::Database;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("postgres://...").await?;
//!
//! let repository = Arc::new(PgTaskRepository::new(db));
//! repository.ensure_schema().await?;
//!
//! let service = TaskService::from_arc(Arc::clone(&repository));
//! let processor = UserEventProcessor::new(repository);
//! # Ok(())
//! # }
//! ```

pub mod entity;
pub mod error;
pub mod events;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod processor;
pub mod publisher;
pub mod repository;
pub mod seeds;
pub mod service;
pub mod streams;

// Re-export commonly used types
pub use error::{TaskError, TaskResult};
pub use events::{UserEvent, UserEventKind};
pub use handlers::TasksApiDoc;
pub use memory::InMemoryTaskRepository;
pub use models::{CreateTask, Task, UpdateTask};
pub use postgres::PgTaskRepository;
pub use processor::{SeedMode, SeedReport, UserEventProcessor};
pub use publisher::UserEventPublisher;
pub use repository::TaskRepository;
pub use seeds::SEED_TASKS;
pub use service::TaskService;
pub use streams::UserEventStream;
