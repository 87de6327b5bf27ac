//! Task Service
//!
//! Keeps a per-user task list in PostgreSQL and in step with the user
//! lifecycle events on the `user-events` Redis stream.
//!
//! ## Architecture
//!
//! ```text
//!                 HTTP (axum)                     Redis Stream (user-events)
//!                      ↓                            ↓ (Consumer Group: task-service-group)
//!     TaskService (handlers, validation)    StreamWorker<UserEvent, UserEventProcessor>
//!                      ↓                            ↓
//!                      └──────── PgTaskRepository ──┘
//!                                      ↓
//!                                 PostgreSQL
//! ```
//!
//! Both paths share one repository handle and one shutdown signal; neither
//! waits on the other.

pub mod config;
pub mod readiness;

use axum::{Router, routing::get};
use axum_helpers::{ShutdownCoordinator, create_router, health_router, serve};
use core_config::AppInfo;
use core_config::tracing::{init_tracing, install_color_eyre};
use database::common::{RetryConfig, retry_with_backoff};
use domain_tasks::{
    PgTaskRepository, TaskRepository, TaskService, TasksApiDoc, UserEventProcessor, handlers,
};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use stream_worker::{StreamConsumer, StreamWorker, init_metrics, render_metrics};
use tracing::{error, info};

use crate::config::Config;
use crate::readiness::Readiness;

/// Task routes, `/health` and `/metrics`.
pub fn api_routes<R: TaskRepository + 'static>(service: TaskService<R>, app_info: AppInfo) -> Router {
    handlers::router(service)
        .merge(health_router(app_info))
        .route("/metrics", get(|| async { render_metrics() }))
}

/// Wrap `routes` with OpenAPI docs, fallback, tracing and CORS.
pub fn app(routes: Router) -> Router {
    create_router::<TasksApiDoc>(routes)
}

/// Run the task service
///
/// 1. Loads configuration and sets up tracing and metrics
/// 2. Connects to PostgreSQL and Redis, retrying while they start; the
///    consumer reads over a connection of its own
/// 3. Creates the tasks table if missing
/// 4. Serves HTTP and consumes `user-events` until SIGINT/SIGTERM
///
/// # Errors
///
/// Returns an error if:
/// - configuration is invalid
/// - a store stays unreachable after the startup retries
/// - the consumer cannot subscribe or its subscription is closed
/// - the HTTP server fails
pub async fn run() -> Result<()> {
    // Colored error reports before anything can fail
    install_color_eyre();

    let config = Config::from_env().wrap_err("Failed to load configuration")?;
    init_tracing(&config.environment);
    init_metrics().wrap_err("Failed to initialize metrics")?;

    info!(
        name = %config.app.name,
        version = %config.app.version,
        environment = ?config.environment,
        "Starting task service"
    );

    let worker_config = config.events.worker_config();
    info!(
        stream = %worker_config.stream_name,
        consumer_group = %worker_config.consumer_group,
        consumer_id = %worker_config.consumer_id,
        commit_policy = %worker_config.commit_policy,
        seed_mode = %config.events.seed_mode,
        "Event consumer configured"
    );

    let postgres_future = async {
        database::postgres::connect_from_config_with_retry(
            config.database.clone(),
            RetryConfig::startup(),
        )
        .await
        .wrap_err("PostgreSQL connection failed")
    };
    let redis_future = async {
        database::redis::connect_from_config_with_retry(config.redis.clone(), RetryConfig::startup())
            .await
            .wrap_err("Redis connection failed")
    };
    // XREADGROUP BLOCK holds its connection, so the consumer gets its own
    let consumer_future = async {
        retry_with_backoff(
            || StreamConsumer::connect(&config.redis.url, worker_config.clone()),
            RetryConfig::startup(),
        )
        .await
        .wrap_err("Event consumer connection failed")
    };
    let (db, redis, consumer) = tokio::try_join!(postgres_future, redis_future, consumer_future)?;

    let repository = Arc::new(PgTaskRepository::new(db.clone()));
    repository
        .ensure_schema()
        .await
        .wrap_err("Failed to create the tasks schema")?;

    let processor =
        UserEventProcessor::new(Arc::clone(&repository)).with_seed_mode(config.events.seed_mode);
    let worker = Arc::new(StreamWorker::new(consumer, processor, worker_config));

    // HTTP
    let readiness = Readiness {
        db,
        redis,
        consumer: worker.subscribe_state(),
    };
    let router = app(
        api_routes(TaskService::from_arc(repository), config.app)
            .merge(readiness::router(readiness)),
    );

    let coordinator = ShutdownCoordinator::new();
    tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.listen_for_signals().await }
    });

    let consumer_task = tokio::spawn({
        let worker = Arc::clone(&worker);
        let coordinator = coordinator.clone();
        let shutdown = coordinator.subscribe();
        async move {
            let result = worker.run(shutdown).await;
            if let Err(e) = &result {
                error!(error = %e, "Event consumer stopped with an error");
                coordinator.shutdown();
            }
            result
        }
    });

    let served = serve(router, &config.server, coordinator.wait()).await;
    // The server may also stop on its own (e.g. bind failure)
    coordinator.shutdown();

    let consumed = consumer_task.await.wrap_err("Event consumer task panicked")?;

    served.wrap_err("HTTP server failed")?;
    consumed.wrap_err("Event consumer failed")?;

    info!("Task service stopped");
    Ok(())
}
