//! Router-level tests for the assembled service
//!
//! The full middleware stack runs here (fallback, OpenAPI, CORS, tracing)
//! over the in-memory repository. `/ready` is checked against real stores.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use core_config::app_info;
use domain_tasks::{InMemoryTaskRepository, Task, TaskService};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use stream_worker::ConsumerState;
use task_service::readiness::{self, Readiness};
use test_utils::{TestDatabase, TestRedis};
use tokio::sync::watch;
use tower::ServiceExt;

fn app() -> Router {
    task_service::app(task_service::api_routes(
        TaskService::new(InMemoryTaskRepository::new()),
        app_info!(),
    ))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_service_identity() {
    let response = get(&app(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["name"], "task_service");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_task_crud_through_full_stack() {
    let app = app();

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/tasks")
                .header("content-type", "application/json")
                .body(Body::from(json!({"title": "Buy milk", "user_id": 7}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Task = serde_json::from_value(body_json(response).await).unwrap();

    let response = get(&app, &format!("/api/tasks/{}", created.id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&app, "/api/tasks/user/7").await;
    let tasks = body_json(response).await;
    assert_eq!(tasks.as_array().map(Vec::len), Some(1));

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/api/tasks/{}", created.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let response = get(&app(), "/api/projects").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_is_served() {
    let response = get(&app(), "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document_lists_task_routes() {
    let response = get(&app(), "/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    let paths = doc["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/tasks/{id}"));
    assert!(paths.contains_key("/api/tasks/user/{user_id}"));
}

#[tokio::test]
async fn test_ready_follows_consumer_state() {
    let db = TestDatabase::new().await;
    let redis = TestRedis::new().await;
    let (state_tx, state_rx) = watch::channel(ConsumerState::Initializing);

    let app = readiness::router(Readiness {
        db: db.connection(),
        redis: redis.connection(),
        consumer: state_rx,
    });

    let response = get(&app, "/ready").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["database"], "connected");
    assert_eq!(body["redis"], "connected");
    assert_eq!(body["consumer"], "disconnected");

    state_tx.send(ConsumerState::Running).unwrap();
    let response = get(&app, "/ready").await;
    assert_eq!(response.status(), StatusCode::OK);

    state_tx.send(ConsumerState::Stopped).unwrap();
    let response = get(&app, "/ready").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
