//! Stream error types and error categorization
//!
//! The category decides what the worker does with a failed message under
//! [`CommitPolicy::AfterApply`](crate::CommitPolicy::AfterApply):
//! - **Transient**: leave it pending, redeliver later
//! - **Permanent**: dead-letter it and commit

use thiserror::Error;

/// Category of error for determining redelivery behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary failure (store or broker unreachable), worth redelivering
    Transient,
    /// Redelivery cannot help (bad data)
    Permanent,
}

impl ErrorCategory {
    /// Whether a message failing with this category should be redelivered.
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorCategory::Transient)
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
        }
    }
}

/// Stream processing errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Payload could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Message handler failed
    #[error("Processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    /// The subscription is gone and cannot be re-established by pulling again
    #[error("Subscription closed: {0}")]
    Closed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StreamError {
    /// Create a transient processing error
    pub fn transient(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    /// Create a permanent processing error
    pub fn permanent(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::Redis(_) => ErrorCategory::Transient,
            StreamError::Serialization(_) => ErrorCategory::Permanent,
            StreamError::Processing { category, .. } => *category,
            StreamError::Closed(_) => ErrorCategory::Permanent,
            StreamError::Config(_) => ErrorCategory::Permanent,
            StreamError::Internal(_) => ErrorCategory::Permanent,
        }
    }

    /// True when the subscription itself is unusable.
    pub fn is_closed(&self) -> bool {
        matches!(self, StreamError::Closed(_))
    }

    /// True for `NOGROUP` replies (group or stream deleted under us).
    pub fn is_nogroup(&self) -> bool {
        matches!(self, StreamError::Redis(e) if e.to_string().contains("NOGROUP"))
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Serialization(err.to_string())
    }
}
