//! Dead Letter Queue (DLQ) management
//!
//! Parks messages the worker gave up on, together with the failure reason.

use crate::error::StreamError;
use crate::message::StreamMessage;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

type StreamEntries = Vec<(String, Vec<(String, String)>)>;

/// Dead Letter Queue manager
#[derive(Clone)]
pub struct DlqManager {
    redis: ConnectionManager,
    dlq_stream: String,
    max_length: i64,
}

impl DlqManager {
    /// Create a new DlqManager
    pub fn new(redis: ConnectionManager, dlq_stream: impl Into<String>) -> Self {
        Self {
            redis,
            dlq_stream: dlq_stream.into(),
            max_length: 10_000,
        }
    }

    /// Set the maximum DLQ length
    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    /// Get the DLQ stream name
    pub fn dlq_stream(&self) -> &str {
        &self.dlq_stream
    }

    /// Move a message to the dead letter queue
    pub async fn move_to_dlq(
        &self,
        message: &StreamMessage,
        error: &str,
    ) -> Result<String, StreamError> {
        let entry = DlqEntry::from_message(message, error);
        let data = serde_json::to_string(&entry)?;
        let mut conn = self.redis.clone();

        let dlq_id: String = redis::cmd("XADD")
            .arg(&self.dlq_stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg("data")
            .arg(&data)
            .query_async(&mut conn)
            .await?;

        info!(
            original_id = %message.id,
            dlq_id = %dlq_id,
            error = %error,
            delivery_count = message.delivery_count,
            "Moved message to DLQ"
        );

        Ok(dlq_id)
    }

    /// Number of entries in the DLQ
    pub async fn len(&self) -> Result<i64, StreamError> {
        let mut conn = self.redis.clone();
        Ok(conn.xlen(&self.dlq_stream).await?)
    }

    /// List DLQ entries, oldest first
    pub async fn list(&self, count: usize) -> Result<Vec<DlqEntry>, StreamError> {
        let mut conn = self.redis.clone();

        let entries: StreamEntries = redis::cmd("XRANGE")
            .arg(&self.dlq_stream)
            .arg("-")
            .arg("+")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let results = entries
            .into_iter()
            .filter_map(|(_id, fields)| {
                fields
                    .into_iter()
                    .find(|(k, _)| k == "data")
                    .and_then(|(_, v)| serde_json::from_str::<DlqEntry>(&v).ok())
            })
            .collect();

        Ok(results)
    }

    /// Purge all entries from the DLQ
    pub async fn purge(&self) -> Result<i64, StreamError> {
        let mut conn = self.redis.clone();
        let len: i64 = conn.xlen(&self.dlq_stream).await?;

        if len > 0 {
            let _: i64 = redis::cmd("XTRIM")
                .arg(&self.dlq_stream)
                .arg("MAXLEN")
                .arg(0)
                .query_async(&mut conn)
                .await?;
            debug!(count = len, "Purged DLQ");
        }

        Ok(len)
    }
}

/// DLQ entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Original stream entry ID
    pub original_id: String,

    /// Producer key of the original entry
    pub key: Option<String>,

    /// Raw payload, exactly as it was read
    pub payload: Option<String>,

    /// Why the message was dead-lettered
    pub error: String,

    /// Deliveries before giving up
    pub delivery_count: u32,

    /// When the message was moved to the DLQ
    pub failed_at: DateTime<Utc>,
}

impl DlqEntry {
    pub fn from_message(message: &StreamMessage, error: &str) -> Self {
        Self {
            original_id: message.id.clone(),
            key: message.key.clone(),
            payload: message.payload.clone(),
            error: error.to_string(),
            delivery_count: message.delivery_count,
            failed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_keeps_raw_payload() {
        let message = StreamMessage::new("5-0", Some("7".into()), Some("{broken".into()))
            .with_delivery_count(6);
        let entry = DlqEntry::from_message(&message, "exceeded max deliveries");

        assert_eq!(entry.original_id, "5-0");
        assert_eq!(entry.key.as_deref(), Some("7"));
        assert_eq!(entry.payload.as_deref(), Some("{broken"));
        assert_eq!(entry.delivery_count, 6);

        let json = serde_json::to_string(&entry).unwrap();
        let back: DlqEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
