/// A backing store failed its readiness check.
#[derive(Debug, thiserror::Error)]
#[error("{store} is not answering: {reason}")]
pub struct DatabaseError {
    /// "PostgreSQL" or "Redis"
    pub store: &'static str,
    pub reason: String,
}

impl DatabaseError {
    pub fn unhealthy(store: &'static str, reason: impl ToString) -> Self {
        Self {
            store,
            reason: reason.to_string(),
        }
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
