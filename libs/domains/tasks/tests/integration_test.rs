//! Integration tests for Tasks domain
//!
//! These tests use real PostgreSQL and Redis via testcontainers to ensure:
//! - Repository queries work against the real schema
//! - Batch seeding is transactional
//! - Events published to `user-events` end up as task rows

use domain_tasks::*;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{CommitPolicy, StreamConsumer, StreamWorker, WorkerConfig};
use test_utils::{TestDataBuilder, TestDatabase, TestRedis, assertions::*};
use tokio::sync::watch;

async fn repository(db: &TestDatabase) -> PgTaskRepository {
    let repo = PgTaskRepository::new(db.connection());
    repo.ensure_schema().await.unwrap();
    repo
}

/// Poll until `user_id` owns `expected` tasks, or fail after 10 seconds.
async fn wait_for_count(repo: &PgTaskRepository, user_id: i64, expected: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let count = repo.count_by_owner(user_id).await.unwrap();
        if count == expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "user {user_id} owns {count} tasks, expected {expected}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

// ============================================================================
// Repository Tests
// ============================================================================

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let db = TestDatabase::new().await;
    let repo = repository(&db).await;
    repo.ensure_schema().await.unwrap();
}

#[tokio::test]
async fn test_create_and_get_task() {
    let db = TestDatabase::new().await;
    let repo = repository(&db).await;
    let builder = TestDataBuilder::from_test_name("create_and_get");
    let user_id = builder.user_id() as i64;

    let created = repo
        .create(CreateTask::new(user_id, builder.name("task", "main"), ""))
        .await
        .unwrap();
    assert!(created.id > 0);
    assert!(!created.completed);

    let retrieved = repo.get_by_id(created.id).await.unwrap();
    let retrieved = assert_some(retrieved, "task should exist");
    assert_eq!(retrieved.title, created.title);
    assert_eq!(retrieved.user_id, user_id);

    assert!(repo.get_by_id(created.id + 1000).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_writes_present_fields_only() {
    let db = TestDatabase::new().await;
    let repo = repository(&db).await;
    let user_id = TestDataBuilder::from_test_name("update_presence").user_id() as i64;

    let mut input = CreateTask::new(user_id, "Write report", "quarterly");
    input.completed = true;
    let created = repo.create(input).await.unwrap();

    let updated = repo
        .update(
            created.id,
            UpdateTask {
                description: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let updated = assert_some(updated, "task should be updated");

    assert_eq!(updated.description, "");
    assert_eq!(updated.title, "Write report");
    assert!(updated.completed);
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.created_at, created.created_at);

    assert!(
        repo.update(created.id + 1000, UpdateTask::default())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_delete_by_owner_scope() {
    let db = TestDatabase::new().await;
    let repo = repository(&db).await;
    let builder = TestDataBuilder::from_test_name("delete_scope");
    let (u1, u2) = (builder.user_id() as i64, builder.other_user_id() as i64);

    repo.create_many(vec![
        CreateTask::new(u1, "a", ""),
        CreateTask::new(u1, "b", ""),
        CreateTask::new(u2, "c", ""),
    ])
    .await
    .unwrap();

    assert_eq!(repo.delete_by_owner(u1).await.unwrap(), 2);
    assert_eq!(repo.delete_by_owner(u1).await.unwrap(), 0);
    assert_eq!(repo.count_by_owner(u2).await.unwrap(), 1);

    let remaining = repo.list().await.unwrap();
    assert_fields(&remaining, |t| t.title.clone(), &["c".to_string()], "remaining titles");
}

#[tokio::test]
async fn test_create_many_rolls_back_on_failure() {
    let db = TestDatabase::new().await;
    let repo = repository(&db).await;
    let user_id = TestDataBuilder::from_test_name("create_many_rollback").user_id() as i64;

    // The third title overflows VARCHAR(255)
    let result = repo
        .create_many(vec![
            CreateTask::new(user_id, "one", ""),
            CreateTask::new(user_id, "two", ""),
            CreateTask::new(user_id, "x".repeat(300), ""),
        ])
        .await;

    assert!(matches!(result, Err(TaskError::Database(_))));
    assert_eq!(repo.count_by_owner(user_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_atomic_seeding_against_postgres() {
    let db = TestDatabase::new().await;
    let repo = Arc::new(repository(&db).await);
    let user_id = TestDataBuilder::from_test_name("atomic_seeding").user_id() as i64;

    let processor = UserEventProcessor::new(Arc::clone(&repo)).with_seed_mode(SeedMode::Atomic);
    let report = processor.on_user_created(user_id).await.unwrap();
    assert!(report.is_complete());

    let tasks = repo.list_by_owner(user_id).await.unwrap();
    let expected: Vec<String> = SEED_TASKS.iter().map(|(t, _)| t.to_string()).collect();
    assert_fields(&tasks, |t| t.title.clone(), &expected, "seed titles");
}

// ============================================================================
// End-to-end: Redis stream -> worker -> Postgres
// ============================================================================

fn worker_config(consumer: &str) -> WorkerConfig {
    WorkerConfig::from_stream_def::<UserEventStream>()
        .with_consumer_id(consumer)
        .with_block_timeout_ms(200)
}

#[tokio::test]
async fn test_user_lifecycle_through_the_stream() {
    let db = TestDatabase::new().await;
    let redis = TestRedis::new().await;
    let repo = Arc::new(repository(&db).await);
    let publisher = UserEventPublisher::new(redis.connection());

    let config = worker_config("e2e-lifecycle");
    let worker = Arc::new(StreamWorker::new(
        StreamConsumer::new(redis.connection(), config.clone()),
        UserEventProcessor::new(Arc::clone(&repo)),
        config,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(shutdown_rx).await }
    });

    publisher
        .publish_user_created(42, "Ada", "ada@example.com", "2024-05-01T10:00:00Z")
        .await
        .unwrap();
    wait_for_count(&repo, 42, 3).await;

    let tasks = repo.list_by_owner(42).await.unwrap();
    assert_fields(
        &tasks,
        |t| t.title.clone(),
        &[
            "Welcome to Todo App!".to_string(),
            "Explore the features".to_string(),
            "Set up your profile".to_string(),
        ],
        "seed titles",
    );
    assert!(tasks.iter().all(|t| !t.completed));

    // A payload that does not decode is dropped; the loop keeps going
    publisher.publish_raw(Some("42"), "not json").await.unwrap();
    publisher
        .publish_raw(Some("42"), r#"{"event_type":"user_renamed","user_id":42}"#)
        .await
        .unwrap();

    publisher.publish_user_deleted(42).await.unwrap();
    wait_for_count(&repo, 42, 0).await;

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_after_apply_commits_once_applied() {
    let db = TestDatabase::new().await;
    let redis = TestRedis::new().await;
    let repo = Arc::new(repository(&db).await);
    let publisher = UserEventPublisher::new(redis.connection());
    let user_id = TestDataBuilder::from_test_name("after_apply_e2e").user_id();

    let config = worker_config("e2e-after-apply").with_commit_policy(CommitPolicy::AfterApply);
    let consumer = StreamConsumer::new(redis.connection(), config.clone());
    let worker = Arc::new(StreamWorker::new(
        consumer,
        UserEventProcessor::new(Arc::clone(&repo)),
        config,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(shutdown_rx).await }
    });

    publisher
        .publish_user_created(user_id, "Bo", "bo@example.com", "2024-05-01T10:00:00Z")
        .await
        .unwrap();
    wait_for_count(&repo, user_id as i64, 3).await;

    // Acked after apply: nothing left pending for the group
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let info = worker.source().stream_info().await.unwrap();
        if info.pending_count == 0 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "entry still pending");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}
