use sea_orm::{Database, DatabaseConnection, DbErr};
use tracing::info;

use super::PostgresConfig;
use crate::common::{RetryConfig, retry_with_backoff};

/// Open a pool sized by `config`.
pub async fn connect_from_config(config: PostgresConfig) -> Result<DatabaseConnection, DbErr> {
    let max_connections = config.max_connections;
    let db = Database::connect(config.into_connect_options()).await?;

    info!(max_connections, "Connected to PostgreSQL");
    Ok(db)
}

/// [`connect_from_config`], retried on `retry` while the server starts.
pub async fn connect_from_config_with_retry(
    config: PostgresConfig,
    retry: RetryConfig,
) -> Result<DatabaseConnection, DbErr> {
    retry_with_backoff(|| connect_from_config(config.clone()), retry).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let config = PostgresConfig::from_url("not-a-database-url");
        assert!(connect_from_config(config).await.is_err());
    }
}
