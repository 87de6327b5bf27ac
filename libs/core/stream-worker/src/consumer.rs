//! Stream consumer for Redis operations
//!
//! Reads a stream through a consumer group and implements [`MessageSource`].
//!
//! Under [`CommitPolicy::OnRead`] every entry is acknowledged as part of the
//! pull, before the worker sees it. Under [`CommitPolicy::AfterApply`] entries
//! stay in the pending list until the worker commits them, and this consumer's
//! own pending entries are always re-read before new ones.
//!
//! Entries left pending by other consumers of the group (a crashed or
//! renamed instance) are claimed with `XAUTOCLAIM` once they have been idle
//! for `claim_idle_ms`, at subscribe time and every `claim_interval_ms`.

use crate::config::{CommitPolicy, WorkerConfig};
use crate::dlq::DlqManager;
use crate::error::StreamError;
use crate::message::StreamMessage;
use crate::registry::MessageKey;
use crate::source::MessageSource;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, RedisResult, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Time allowed on top of `BLOCK` before the client gives up on a reply.
const RESPONSE_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Entries claimed per `XAUTOCLAIM` call.
const CLAIM_BATCH: usize = 100;

/// Upper bound on `XAUTOCLAIM` cursor rounds per claim pass.
const MAX_CLAIM_ROUNDS: usize = 10;

/// Stream consumer backed by a Redis consumer group
pub struct StreamConsumer {
    redis: ConnectionManager,
    config: WorkerConfig,
    dlq: DlqManager,
    buffer: Mutex<VecDeque<StreamMessage>>,
    /// Set when entries may be sitting unacknowledged in our pending list.
    recover_pending: AtomicBool,
    last_claim: Mutex<Option<Instant>>,
    released: AtomicBool,
}

impl StreamConsumer {
    /// Open a dedicated connection for blocking reads and build a consumer on it.
    ///
    /// A blocking `XREADGROUP` holds its multiplexed connection until the
    /// server answers, so the consumer gets a connection of its own whose
    /// response timeout outlasts `block_timeout_ms`. Share nothing else on it.
    pub async fn connect(url: &str, config: WorkerConfig) -> Result<Self, StreamError> {
        let client = redis::Client::open(url)?;
        let manager_config = ConnectionManagerConfig::new()
            .set_response_timeout(Some(response_timeout(config.block_timeout_ms)));
        let redis = ConnectionManager::new_with_config(client, manager_config).await?;
        Ok(Self::new(redis, config))
    }

    /// Create a consumer over an existing connection.
    ///
    /// The connection's response timeout must exceed `block_timeout_ms`;
    /// see [`StreamConsumer::connect`].
    pub fn new(redis: ConnectionManager, config: WorkerConfig) -> Self {
        let dlq = DlqManager::new(redis.clone(), config.dlq_stream.clone())
            .with_max_length(config.max_length);
        Self {
            redis,
            config,
            dlq,
            buffer: Mutex::new(VecDeque::new()),
            recover_pending: AtomicBool::new(true),
            last_claim: Mutex::new(None),
            released: AtomicBool::new(false),
        }
    }

    /// Get the stream name
    pub fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    /// Get the consumer group
    pub fn consumer_group(&self) -> &str {
        &self.config.consumer_group
    }

    /// Get the consumer ID
    pub fn consumer_id(&self) -> &str {
        &self.config.consumer_id
    }

    /// Dead-letter manager used by this consumer
    pub fn dlq(&self) -> &DlqManager {
        &self.dlq
    }

    /// Create the consumer group if it doesn't exist.
    ///
    /// A new group starts at the beginning of the stream, so events published
    /// before the first subscription are still delivered.
    pub async fn ensure_consumer_group(&self) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Consumer group already exists"
                );
                Ok(())
            }
            Err(e) => Err(StreamError::Redis(e)),
        }
    }

    /// Get stream info (length and pending count)
    pub async fn stream_info(&self) -> Result<StreamInfo, StreamError> {
        let mut conn = self.redis.clone();

        let length: i64 = conn.xlen(&self.config.stream_name).await?;

        let pending: RedisResult<(i64, Option<String>, Option<String>, Option<Vec<(String, i64)>>)> =
            redis::cmd("XPENDING")
                .arg(&self.config.stream_name)
                .arg(&self.config.consumer_group)
                .query_async(&mut conn)
                .await;

        Ok(StreamInfo {
            stream_name: self.config.stream_name.clone(),
            consumer_group: self.config.consumer_group.clone(),
            length,
            pending_count: pending.map(|(count, _, _, _)| count).unwrap_or(0),
        })
    }

    /// Entries delivered to this consumer but never acknowledged.
    async fn read_own_pending(&self) -> Result<Vec<StreamMessage>, StreamError> {
        let mut conn = self.redis.clone();

        let reply: Value = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg("COUNT")
            .arg(self.config.batch_size)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg("0")
            .query_async(&mut conn)
            .await?;

        let mut messages = parse_reply(reply);
        if messages.is_empty() {
            return Ok(messages);
        }

        let counts = self.delivery_counts().await?;
        for message in &mut messages {
            if let Some(count) = counts.get(&message.id) {
                message.delivery_count = *count;
            }
        }

        debug!(count = messages.len(), "Recovered pending entries");
        Ok(messages)
    }

    /// Delivery counts of this consumer's pending entries, keyed by entry ID.
    async fn delivery_counts(&self) -> Result<HashMap<String, u32>, StreamError> {
        let mut conn = self.redis.clone();

        let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(self.config.batch_size)
            .arg(&self.config.consumer_id)
            .query_async(&mut conn)
            .await?;

        Ok(pending
            .into_iter()
            .map(|(id, _, _, deliveries)| (id, u32::try_from(deliveries).unwrap_or(u32::MAX)))
            .collect())
    }

    /// Block for entries never delivered to the group.
    async fn read_new(&self) -> Result<Vec<StreamMessage>, StreamError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<Value> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg("COUNT")
            .arg(self.config.batch_size)
            .arg("BLOCK")
            .arg(self.config.block_timeout_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(reply) => Ok(parse_reply(reply)),
            // The client may give up before the server-side BLOCK elapses. A
            // reply that arrives late leaves the entry in our pending list.
            Err(e) if e.is_timeout() => {
                debug!("BLOCK read timed out on the client side");
                self.recover_pending.store(true, Ordering::Release);
                Ok(vec![])
            }
            Err(e) => Err(StreamError::Redis(e)),
        }
    }

    /// Move entries idle for `claim_idle_ms` in any consumer's pending list
    /// into ours. They are then read back like our own pending entries.
    pub async fn claim_idle(&self) -> Result<usize, StreamError> {
        if let Ok(mut last) = self.last_claim.lock() {
            *last = Some(Instant::now());
        }

        let mut conn = self.redis.clone();
        let mut cursor = "0-0".to_string();
        let mut claimed = 0;

        for _ in 0..MAX_CLAIM_ROUNDS {
            // JUSTID leaves delivery counts alone; the pending read counts them
            let reply: Value = redis::cmd("XAUTOCLAIM")
                .arg(&self.config.stream_name)
                .arg(&self.config.consumer_group)
                .arg(&self.config.consumer_id)
                .arg(self.config.claim_idle_ms)
                .arg(&cursor)
                .arg("COUNT")
                .arg(CLAIM_BATCH)
                .arg("JUSTID")
                .query_async(&mut conn)
                .await?;

            let (next, ids) = parse_autoclaim(reply);
            claimed += ids;
            match next {
                Some(next) if next != "0-0" => cursor = next,
                _ => break,
            }
        }

        if claimed > 0 {
            warn!(subscription = %self.describe(), claimed, "Claimed idle pending entries");
            self.recover_pending.store(true, Ordering::Release);
        }
        Ok(claimed)
    }

    fn claim_due(&self) -> bool {
        let interval = Duration::from_millis(self.config.claim_interval_ms);
        self.last_claim
            .lock()
            .map(|last| last.is_none_or(|at| at.elapsed() >= interval))
            .unwrap_or(false)
    }

    async fn fill_buffer(&self) -> Result<Vec<StreamMessage>, StreamError> {
        if self.claim_due() {
            self.claim_idle().await?;
        }

        let after_apply = self.config.commit_policy == CommitPolicy::AfterApply;

        if after_apply || self.recover_pending.load(Ordering::Acquire) {
            let pending = self.read_own_pending().await?;
            if !pending.is_empty() {
                return Ok(pending);
            }
            self.recover_pending.store(false, Ordering::Release);
        }

        self.read_new().await
    }

    async fn ack(&self, ids: &[&str]) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();
        let acked: i64 = conn
            .xack(&self.config.stream_name, &self.config.consumer_group, ids)
            .await?;
        debug!(requested = ids.len(), acked, "Acknowledged entries");
        Ok(())
    }

    fn pop_buffered(&self) -> Option<StreamMessage> {
        self.buffer
            .lock()
            .map(|mut buffer| buffer.pop_front())
            .unwrap_or(None)
    }

    fn buffer_rest(&self, messages: impl IntoIterator<Item = StreamMessage>) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.extend(messages);
        }
    }
}

#[async_trait]
impl MessageSource for StreamConsumer {
    async fn subscribe(&self) -> Result<(), StreamError> {
        self.ensure_consumer_group().await?;
        if let Err(e) = self.claim_idle().await {
            warn!(error = %e, "Failed to claim idle entries on subscribe");
        }
        info!(
            subscription = %self.describe(),
            commit_policy = %self.config.commit_policy,
            "Subscribed to stream"
        );
        Ok(())
    }

    async fn pull(&self) -> Result<Option<StreamMessage>, StreamError> {
        if self.released.load(Ordering::Acquire) {
            return Err(StreamError::Closed(format!(
                "{} has been released",
                self.describe()
            )));
        }

        if let Some(message) = self.pop_buffered() {
            return Ok(Some(message));
        }

        let messages = match self.fill_buffer().await {
            Ok(messages) => messages,
            Err(e) if e.is_nogroup() => {
                warn!(subscription = %self.describe(), "Consumer group missing, recreating");
                self.ensure_consumer_group().await?;
                return Err(e);
            }
            Err(e) => {
                self.recover_pending.store(true, Ordering::Release);
                return Err(e);
            }
        };

        if messages.is_empty() {
            return Ok(None);
        }

        if self.config.commit_policy == CommitPolicy::OnRead {
            let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
            if let Err(e) = self.ack(&ids).await {
                self.recover_pending.store(true, Ordering::Release);
                return Err(e);
            }
        }

        let mut messages = messages.into_iter();
        let first = messages.next();
        self.buffer_rest(messages);
        Ok(first)
    }

    async fn commit(&self, message: &StreamMessage) -> Result<(), StreamError> {
        match self.config.commit_policy {
            CommitPolicy::OnRead => Ok(()),
            CommitPolicy::AfterApply => self.ack(&[message.id.as_str()]).await,
        }
    }

    async fn dead_letter(&self, message: &StreamMessage, reason: &str) -> Result<(), StreamError> {
        self.dlq.move_to_dlq(message, reason).await.map(|_| ())
    }

    async fn release(&self) -> Result<(), StreamError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let dropped = self
            .buffer
            .lock()
            .map(|mut buffer| buffer.drain(..).count())
            .unwrap_or(0);

        if dropped > 0 && self.config.commit_policy == CommitPolicy::OnRead {
            warn!(
                subscription = %self.describe(),
                dropped,
                "Released with acknowledged entries still buffered"
            );
        }

        info!(subscription = %self.describe(), "Released stream subscription");
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.stream_name, self.config.consumer_group, self.config.consumer_id
        )
    }
}

/// Stream information
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub stream_name: String,
    pub consumer_group: String,
    pub length: i64,
    pub pending_count: i64,
}

fn response_timeout(block_timeout_ms: u64) -> Duration {
    Duration::from_millis(block_timeout_ms) + RESPONSE_TIMEOUT_MARGIN
}

/// Entries of an `XREADGROUP` reply, in stream order.
///
/// Field values stay raw bytes here; a payload that is not UTF-8 becomes a
/// message that fails to decode instead of failing the whole reply.
fn parse_reply(reply: Value) -> Vec<StreamMessage> {
    let streams = match reply {
        // RESP2: [[stream, entries], ...]
        Value::Array(streams) => streams
            .into_iter()
            .filter_map(|stream| match stream {
                Value::Array(parts) => parts.into_iter().nth(1),
                _ => None,
            })
            .collect(),
        // RESP3: {stream: entries}
        Value::Map(streams) => streams.into_iter().map(|(_, entries)| entries).collect(),
        _ => vec![],
    };

    streams.into_iter().flat_map(parse_entries).collect()
}

fn parse_entries(entries: Value) -> Vec<StreamMessage> {
    match entries {
        Value::Array(entries) => entries.into_iter().filter_map(parse_entry).collect(),
        _ => vec![],
    }
}

/// `[id, [field, value, ...]]`. Fields are nil for entries trimmed from the
/// stream while still pending; those decode as "no payload".
fn parse_entry(entry: Value) -> Option<StreamMessage> {
    let Value::Array(parts) = entry else {
        return None;
    };
    let mut parts = parts.into_iter();
    let id = parts.next().and_then(into_text)?;

    let mut key = None;
    let mut payload = None;
    for (field, value) in field_pairs(parts.next().unwrap_or(Value::Nil)) {
        match into_bytes(field).as_deref() {
            Some(name) if name == MessageKey::Payload.as_ref().as_bytes() => payload = into_bytes(value),
            Some(name) if name == MessageKey::Key.as_ref().as_bytes() => key = into_bytes(value),
            _ => {}
        }
    }

    Some(StreamMessage::from_bytes(id, key, payload))
}

fn field_pairs(fields: Value) -> Vec<(Value, Value)> {
    match fields {
        Value::Array(flat) => {
            let mut flat = flat.into_iter();
            let mut pairs = Vec::new();
            while let (Some(field), Some(value)) = (flat.next(), flat.next()) {
                pairs.push((field, value));
            }
            pairs
        }
        Value::Map(pairs) => pairs,
        _ => vec![],
    }
}

/// `XAUTOCLAIM ... JUSTID` reply: `[next_cursor, [ids], [deleted_ids]]`.
fn parse_autoclaim(reply: Value) -> (Option<String>, usize) {
    let Value::Array(parts) = reply else {
        return (None, 0);
    };
    let mut parts = parts.into_iter();
    let cursor = parts.next().and_then(into_text);
    let claimed = match parts.next() {
        Some(Value::Array(ids)) => ids.len(),
        _ => 0,
    };
    (cursor, claimed)
}

fn into_bytes(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::BulkString(bytes) => Some(bytes),
        Value::SimpleString(text) => Some(text.into_bytes()),
        Value::Int(n) => Some(n.to_string().into_bytes()),
        _ => None,
    }
}

fn into_text(value: Value) -> Option<String> {
    into_bytes(value).and_then(|bytes| String::from_utf8(bytes).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(text: &[u8]) -> Value {
        Value::BulkString(text.to_vec())
    }

    fn entry(id: &str, fields: &[(&str, &[u8])]) -> Value {
        let flat = fields
            .iter()
            .flat_map(|(field, value)| [bulk(field.as_bytes()), bulk(value)])
            .collect();
        Value::Array(vec![bulk(id.as_bytes()), Value::Array(flat)])
    }

    fn reply(entries: Vec<Value>) -> Value {
        Value::Array(vec![Value::Array(vec![
            bulk(b"user-events"),
            Value::Array(entries),
        ])])
    }

    #[test]
    fn test_parse_entry_reads_key_and_payload() {
        let messages = parse_reply(reply(vec![entry(
            "1700000000000-0",
            &[
                ("key", b"42".as_slice()),
                ("payload", br#"{"event_type":"user_created"}"#.as_slice()),
            ],
        )]));

        let message = &messages[0];
        assert_eq!(message.id, "1700000000000-0");
        assert_eq!(message.key.as_deref(), Some("42"));
        assert!(message.payload.as_deref().unwrap().contains("user_created"));
        assert_eq!(message.delivery_count, 1);
    }

    #[test]
    fn test_parse_entry_without_payload() {
        let messages = parse_reply(reply(vec![
            entry("1-0", &[("other", b"x".as_slice())]),
            // Trimmed while pending
            Value::Array(vec![bulk(b"2-0"), Value::Nil]),
        ]));

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.payload.is_none() && m.key.is_none()));
    }

    #[test]
    fn test_non_utf8_payload_does_not_poison_the_reply() {
        let messages = parse_reply(reply(vec![
            entry("1-0", &[("payload", [0xff, 0xfe, b'{'].as_slice())]),
            entry("2-0", &[("payload", br#"{"n":7}"#.as_slice())]),
        ]));

        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1-0", "2-0"]);
        assert!(matches!(
            messages[0].decode::<serde_json::Value>(),
            Err(StreamError::Serialization(_))
        ));
        assert_eq!(messages[1].decode::<serde_json::Value>().unwrap()["n"], 7);
    }

    #[test]
    fn test_parse_resp3_map_reply() {
        let reply = Value::Map(vec![(
            bulk(b"user-events"),
            Value::Array(vec![entry("5-0", &[("payload", b"{}".as_slice())])]),
        )]);

        let messages = parse_reply(reply);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "5-0");
    }

    #[test]
    fn test_nil_reply_is_empty() {
        assert!(parse_reply(Value::Nil).is_empty());
    }

    #[test]
    fn test_parse_autoclaim_reply() {
        let reply = Value::Array(vec![
            bulk(b"0-0"),
            Value::Array(vec![bulk(b"1-0"), bulk(b"2-0")]),
            Value::Array(vec![]),
        ]);
        assert_eq!(parse_autoclaim(reply), (Some("0-0".to_string()), 2));
        assert_eq!(parse_autoclaim(Value::Nil), (None, 0));
    }

    #[test]
    fn test_response_timeout_outlasts_block() {
        assert!(response_timeout(5000) > Duration::from_millis(5000));
        assert!(response_timeout(0) >= RESPONSE_TIMEOUT_MARGIN);
    }
}
