//! Stream producer
//!
//! Appends keyed JSON entries to a stream in the layout [`StreamConsumer`]
//! reads back.
//!
//! ```rust,ignore
//! let producer = StreamProducer::from_stream_def::<UserEventStream>(redis);
//! producer.send(Some("42"), &event).await?;
//! ```
//!
//! [`StreamConsumer`]: crate::StreamConsumer

use crate::error::StreamError;
use crate::registry::{MessageKey, StreamDef};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use tracing::debug;

/// Generic stream producer.
#[derive(Clone)]
pub struct StreamProducer {
    redis: ConnectionManager,
    stream_name: String,
    max_length: i64,
}

impl StreamProducer {
    /// Create a new StreamProducer for a specific stream.
    pub fn new(redis: ConnectionManager, stream_name: impl Into<String>) -> Self {
        Self {
            redis,
            stream_name: stream_name.into(),
            max_length: 100_000,
        }
    }

    /// Create a producer from a `StreamDef` implementation.
    pub fn from_stream_def<S: StreamDef>(redis: ConnectionManager) -> Self {
        Self {
            redis,
            stream_name: S::STREAM_NAME.to_string(),
            max_length: S::MAX_LENGTH,
        }
    }

    /// Set the maximum stream length (MAXLEN ~).
    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    /// Get the stream name.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Serialize `payload` as JSON and append it.
    ///
    /// Returns the Redis stream entry ID.
    pub async fn send<T: Serialize>(
        &self,
        key: Option<&str>,
        payload: &T,
    ) -> Result<String, StreamError> {
        let json = serde_json::to_string(payload)?;
        self.send_raw(key, &json).await
    }

    /// Append a payload verbatim, without serializing it.
    pub async fn send_raw(&self, key: Option<&str>, payload: &str) -> Result<String, StreamError> {
        let mut conn = self.redis.clone();

        let mut cmd = redis::cmd("XADD");
        cmd.arg(&self.stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*");
        if let Some(key) = key {
            cmd.arg(MessageKey::Key.as_ref()).arg(key);
        }
        cmd.arg(MessageKey::Payload.as_ref()).arg(payload);

        let stream_id: String = cmd.query_async(&mut conn).await?;

        debug!(
            stream = %self.stream_name,
            stream_id = %stream_id,
            key = ?key,
            "Appended entry"
        );

        Ok(stream_id)
    }

    /// Get the current stream length.
    pub async fn stream_length(&self) -> Result<i64, StreamError> {
        let mut conn = self.redis.clone();
        let len: i64 = conn.xlen(&self.stream_name).await?;
        Ok(len)
    }
}
