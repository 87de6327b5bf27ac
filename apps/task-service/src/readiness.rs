//! `/ready`: store, broker and consumer checks for orchestrator probes.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_helpers::{HealthCheckFuture, run_health_checks};
use database::postgres::DatabaseConnection;
use database::redis::ConnectionManager;
use stream_worker::ConsumerState;
use tokio::sync::watch;

#[derive(Clone)]
pub struct Readiness {
    pub db: DatabaseConnection,
    pub redis: ConnectionManager,
    pub consumer: watch::Receiver<ConsumerState>,
}

/// Ready only while the consumer is running and both stores answer.
async fn ready_handler(State(readiness): State<Readiness>) -> Response {
    let mut redis = readiness.redis.clone();
    let consumer_state = *readiness.consumer.borrow();

    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![
        (
            "database",
            Box::pin(async {
                database::postgres::check_health(&readiness.db)
                    .await
                    .map_err(|e| e.to_string())
            }),
        ),
        (
            "redis",
            Box::pin(async move {
                database::redis::check_health(&mut redis)
                    .await
                    .map_err(|e| e.to_string())
            }),
        ),
        (
            "consumer",
            Box::pin(async move {
                match consumer_state {
                    ConsumerState::Running => Ok(()),
                    other => Err(format!("consumer is {other}")),
                }
            }),
        ),
    ];

    match run_health_checks(checks).await {
        Ok(ready) => ready.into_response(),
        Err(not_ready) => not_ready.into_response(),
    }
}

pub fn router(readiness: Readiness) -> Router {
    Router::new()
        .route("/ready", get(ready_handler))
        .with_state(readiness)
}
