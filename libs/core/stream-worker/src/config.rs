//! Worker configuration
//!
//! This module provides `WorkerConfig` and the offset [`CommitPolicy`].

use crate::registry::StreamDef;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// When a pulled message counts as consumed by the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Consumed as part of the pull. A failing handler never causes
    /// redelivery; malformed payloads are gone for good.
    #[default]
    OnRead,
    /// Committed only once the handler succeeded (or the message was
    /// dead-lettered). Transient failures are redelivered until
    /// `max_deliveries` is exceeded.
    AfterApply,
}

/// Configuration for the stream worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Redis stream name
    pub stream_name: String,

    /// Consumer group name
    pub consumer_group: String,

    /// Consumer name inside the group (auto-generated if not provided)
    pub consumer_id: String,

    /// Dead letter stream name
    pub dlq_stream: String,

    /// Approximate cap (MAXLEN ~) applied by producers and the DLQ
    pub max_length: i64,

    /// Entries requested per pull (COUNT)
    pub batch_size: usize,

    /// How long one pull blocks waiting for an entry (BLOCK)
    pub block_timeout_ms: u64,

    /// Offset commit policy
    pub commit_policy: CommitPolicy,

    /// Deliveries after which a failing message is dead-lettered (AfterApply)
    pub max_deliveries: u32,

    /// Pause after a failed pull; 0 retries immediately
    pub read_error_backoff_ms: u64,

    /// Pause before a transiently failed message is redelivered (AfterApply)
    pub redelivery_delay_ms: u64,

    /// Entries idle this long in any consumer's pending list are claimed
    pub claim_idle_ms: u64,

    /// How often idle entries are claimed while running
    pub claim_interval_ms: u64,
}

impl WorkerConfig {
    /// Create a new WorkerConfig from a StreamDef
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self {
            dlq_stream: S::DLQ_STREAM.to_string(),
            max_length: S::MAX_LENGTH,
            block_timeout_ms: S::BLOCK_TIMEOUT_MS,
            ..Self::new(S::STREAM_NAME, S::CONSUMER_GROUP)
        }
    }

    /// Create a new WorkerConfig with explicit values
    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        let stream_name = stream_name.into();
        Self {
            dlq_stream: format!("{}:dlq", stream_name),
            stream_name,
            consumer_group: consumer_group.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            max_length: 100_000,
            batch_size: 1,
            block_timeout_ms: 5000,
            commit_policy: CommitPolicy::OnRead,
            max_deliveries: 5,
            read_error_backoff_ms: 0,
            redelivery_delay_ms: 1000,
            claim_idle_ms: 60_000,
            claim_interval_ms: 30_000,
        }
    }

    /// Set the consumer ID
    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    /// Set the DLQ stream name
    pub fn with_dlq_stream(mut self, stream: impl Into<String>) -> Self {
        self.dlq_stream = stream.into();
        self
    }

    /// Set the maximum stream length
    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the blocking timeout of a single pull
    pub fn with_block_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.block_timeout_ms = timeout_ms;
        self
    }

    /// Set the offset commit policy
    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    /// Set the delivery limit before dead-lettering
    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }

    /// Set the pause after a failed pull
    pub fn with_read_error_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.read_error_backoff_ms = backoff_ms;
        self
    }

    /// Set the pause before redelivering a transiently failed message
    pub fn with_redelivery_delay_ms(mut self, delay_ms: u64) -> Self {
        self.redelivery_delay_ms = delay_ms;
        self
    }

    /// Set the idle time after which pending entries of other consumers are claimed
    pub fn with_claim_idle_ms(mut self, idle_ms: u64) -> Self {
        self.claim_idle_ms = idle_ms;
        self
    }

    /// Set how often idle entries are claimed while running
    pub fn with_claim_interval_ms(mut self, interval_ms: u64) -> Self {
        self.claim_interval_ms = interval_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    struct TestStream;

    impl StreamDef for TestStream {
        const STREAM_NAME: &'static str = "test:stream";
        const CONSUMER_GROUP: &'static str = "test:group";
        const DLQ_STREAM: &'static str = "test:dlq";
    }

    #[test]
    fn test_from_stream_def() {
        let config = WorkerConfig::from_stream_def::<TestStream>();

        assert_eq!(config.stream_name, "test:stream");
        assert_eq!(config.consumer_group, "test:group");
        assert_eq!(config.dlq_stream, "test:dlq");
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.commit_policy, CommitPolicy::OnRead);
        assert_eq!(config.read_error_backoff_ms, 0);
        assert_eq!(config.claim_idle_ms, 60_000);
        assert!(config.consumer_id.starts_with("worker-"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = WorkerConfig::new("my:stream", "my:group")
            .with_consumer_id("worker-1")
            .with_batch_size(0)
            .with_block_timeout_ms(250)
            .with_commit_policy(CommitPolicy::AfterApply)
            .with_max_deliveries(3);

        assert_eq!(config.dlq_stream, "my:stream:dlq");
        assert_eq!(config.consumer_id, "worker-1");
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.block_timeout_ms, 250);
        assert_eq!(config.commit_policy, CommitPolicy::AfterApply);
        assert_eq!(config.max_deliveries, 3);
    }

    #[test]
    fn test_commit_policy_parsing() {
        assert_eq!(CommitPolicy::from_str("on_read").unwrap(), CommitPolicy::OnRead);
        assert_eq!(
            CommitPolicy::from_str("AFTER_APPLY").unwrap(),
            CommitPolicy::AfterApply
        );
        assert!(CommitPolicy::from_str("eventually").is_err());
        assert_eq!(CommitPolicy::AfterApply.to_string(), "after_apply");
    }
}
