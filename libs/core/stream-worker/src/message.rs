//! Raw stream message
//!
//! A pulled entry before decoding: payload bytes plus stream metadata.

use crate::error::StreamError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

/// One entry pulled from the stream, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Redis stream entry ID (e.g., "1234567890123-0")
    pub id: String,

    /// Producer-chosen key, if any
    pub key: Option<String>,

    /// JSON payload; `None` when the entry has no payload field
    pub payload: Option<String>,

    /// Set when the raw payload bytes were not UTF-8; `payload` then holds
    /// a lossy copy for logs and the DLQ.
    pub payload_error: Option<String>,

    /// Number of times this entry has been delivered to the group
    pub delivery_count: u32,

    /// When the entry was appended (parsed from the ID)
    pub timestamp: DateTime<Utc>,
}

impl StreamMessage {
    /// First delivery of an entry.
    pub fn new(id: impl Into<String>, key: Option<String>, payload: Option<String>) -> Self {
        let id = id.into();
        let timestamp = parse_timestamp(&id);
        Self {
            id,
            key,
            payload,
            payload_error: None,
            delivery_count: 1,
            timestamp,
        }
    }

    /// Build a message from raw field bytes as read off the wire.
    pub fn from_bytes(id: impl Into<String>, key: Option<Vec<u8>>, payload: Option<Vec<u8>>) -> Self {
        let key = key.map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        match payload.map(String::from_utf8) {
            Some(Err(e)) => {
                let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
                let mut message = Self::new(id, key, Some(lossy));
                message.payload_error = Some(format!("payload is not valid UTF-8: {}", e.utf8_error()));
                message
            }
            Some(Ok(text)) => Self::new(id, key, Some(text)),
            None => Self::new(id, key, None),
        }
    }

    pub fn with_delivery_count(mut self, delivery_count: u32) -> Self {
        self.delivery_count = delivery_count;
        self
    }

    /// Decode the payload as JSON.
    pub fn decode<J: DeserializeOwned>(&self) -> Result<J, StreamError> {
        if let Some(reason) = &self.payload_error {
            return Err(StreamError::Serialization(reason.clone()));
        }
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| StreamError::Serialization("message has no payload field".into()))?;
        Ok(serde_json::from_str(payload)?)
    }

    /// Check if this is a redelivery
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }

    /// Time since the entry was appended, in milliseconds.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.timestamp).num_milliseconds()
    }
}

/// Stream IDs are "timestamp_ms-sequence"; fall back to now for anything else.
fn parse_timestamp(stream_id: &str) -> DateTime<Utc> {
    stream_id
        .split('-')
        .next()
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ping {
        seq: u32,
    }

    #[test]
    fn test_timestamp_from_stream_id() {
        let message = StreamMessage::new("1700000000000-3", None, None);
        assert_eq!(message.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert!(!message.is_redelivery());
    }

    #[test]
    fn test_timestamp_falls_back_for_foreign_ids() {
        let message = StreamMessage::new("mem-7", None, None);
        assert!(message.age_ms() < 1000);
    }

    #[test]
    fn test_decode_payload() {
        let message = StreamMessage::new("1-0", Some("42".into()), Some(r#"{"seq":9}"#.into()));
        assert_eq!(message.decode::<Ping>().unwrap(), Ping { seq: 9 });
    }

    #[test]
    fn test_decode_rejects_non_json_and_missing_payload() {
        let garbage = StreamMessage::new("1-0", None, Some("not json at all".into()));
        assert!(matches!(
            garbage.decode::<Ping>(),
            Err(StreamError::Serialization(_))
        ));

        let empty = StreamMessage::new("1-1", None, None);
        assert!(matches!(
            empty.decode::<Ping>(),
            Err(StreamError::Serialization(_))
        ));
    }

    #[test]
    fn test_from_bytes_keeps_text_payload() {
        let message = StreamMessage::from_bytes(
            "1-0",
            Some(b"42".to_vec()),
            Some(br#"{"seq":1}"#.to_vec()),
        );
        assert_eq!(message.key.as_deref(), Some("42"));
        assert_eq!(message.decode::<Ping>().unwrap(), Ping { seq: 1 });
    }

    #[test]
    fn test_non_utf8_payload_fails_to_decode() {
        let message = StreamMessage::from_bytes("1-0", None, Some(vec![0xff, 0xfe, b'{']));

        assert!(message.payload_error.is_some());
        assert!(message.payload.as_deref().unwrap().ends_with('{'));
        assert!(matches!(
            message.decode::<Ping>(),
            Err(StreamError::Serialization(reason)) if reason.contains("UTF-8")
        ));
    }

    #[test]
    fn test_redelivery() {
        let message = StreamMessage::new("1-0", None, None).with_delivery_count(3);
        assert!(message.is_redelivery());
    }
}
