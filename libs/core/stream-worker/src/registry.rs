//! Stream registry types and definitions.
//!
//! This module provides:
//! - `StreamDef` trait for domain-specific stream definitions
//! - `MessageKey` enum for the field names of a stream entry
//! - `StreamJob` / `StreamProcessor` traits implemented by domains

use crate::error::StreamError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use strum::{AsRefStr, Display, EnumString};

/// Field names used in stream entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKey {
    /// The event payload (JSON serialized).
    Payload,
    /// Partition/ordering key chosen by the producer (e.g. a user id).
    Key,
    /// Dead-letter entries: the original entry ID.
    OriginalId,
    /// Dead-letter entries: why the message was dead-lettered.
    Error,
}

/// Stream definition trait.
///
/// Each domain implements this trait to define their stream configuration.
///
/// ```rust,ignore
/// use stream_worker::StreamDef;
///
/// pub struct UserEventStream;
///
/// impl StreamDef for UserEventStream {
///     const STREAM_NAME: &'static str = "user-events";
///     const CONSUMER_GROUP: &'static str = "task-service-group";
///     const DLQ_STREAM: &'static str = "user-events:dlq";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    /// The Redis stream name.
    const STREAM_NAME: &'static str;

    /// The consumer group name for this stream.
    const CONSUMER_GROUP: &'static str;

    /// The dead letter stream name.
    const DLQ_STREAM: &'static str;

    /// Maximum stream length before auto-trim (MAXLEN ~).
    const MAX_LENGTH: i64 = 100_000;

    /// How long a single pull blocks.
    const BLOCK_TIMEOUT_MS: u64 = 5000;
}

/// A payload type carried by a stream.
pub trait StreamJob: DeserializeOwned + Send + Sync {
    /// Short identifier for logs (e.g. "user_created:42").
    fn job_id(&self) -> String;
}

/// Trait for message processors.
///
/// Domain handlers implement this trait to apply decoded messages.
///
/// ```rust,ignore
/// #[async_trait]
/// impl StreamProcessor<UserEvent> for UserEventProcessor<R> {
///     async fn process(&self, event: &UserEvent) -> Result<(), StreamError> {
///         self.dispatch(event).await
///     }
///
///     fn name(&self) -> &'static str {
///         "UserEventProcessor"
///     }
/// }
/// ```
#[async_trait]
pub trait StreamProcessor<J: StreamJob>: Send + Sync {
    /// Apply a single message.
    async fn process(&self, job: &J) -> Result<(), StreamError>;

    /// Processor name for logs and metric labels.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_message_key_names() {
        assert_eq!(MessageKey::Payload.as_ref(), "payload");
        assert_eq!(MessageKey::OriginalId.to_string(), "original_id");
        assert_eq!(MessageKey::from_str("key").unwrap(), MessageKey::Key);
    }

    struct Defaults;

    impl StreamDef for Defaults {
        const STREAM_NAME: &'static str = "s";
        const CONSUMER_GROUP: &'static str = "g";
        const DLQ_STREAM: &'static str = "s:dlq";
    }

    #[test]
    fn test_stream_def_defaults() {
        assert_eq!(Defaults::MAX_LENGTH, 100_000);
        assert_eq!(Defaults::BLOCK_TIMEOUT_MS, 5000);
    }
}
