use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};

use crate::common::{DatabaseError, DatabaseResult};

/// Run `SELECT 1` against the pool.
pub async fn check_health(db: &DatabaseConnection) -> DatabaseResult<()> {
    let select_one = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned());
    db.query_one_raw(select_one)
        .await
        .map(|_| ())
        .map_err(|e| DatabaseError::unhealthy("PostgreSQL", e))
}
