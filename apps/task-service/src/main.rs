//! Task Service - Entry Point
//!
//! REST API over the task store plus the `user-events` consumer.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    task_service::run().await
}
