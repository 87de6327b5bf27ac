//! Producer side of the user event stream.
//!
//! The user service owns publishing in production; this is what it writes,
//! used by tests and tooling.

use redis::aio::ConnectionManager;
use stream_worker::{StreamError, StreamProducer};
use tracing::info;

use crate::events::UserEvent;
use crate::streams::UserEventStream;

#[derive(Clone)]
pub struct UserEventPublisher {
    producer: StreamProducer,
}

impl UserEventPublisher {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            producer: StreamProducer::from_stream_def::<UserEventStream>(redis),
        }
    }

    /// Append `event`, keyed by its user id. Returns the stream entry ID.
    pub async fn publish(&self, event: &UserEvent) -> Result<String, StreamError> {
        let key = event.user_id.to_string();
        let id = self.producer.send(Some(&key), event).await?;

        info!(
            event_type = %event.event_type,
            user_id = event.user_id,
            stream_id = %id,
            "Published user event"
        );
        Ok(id)
    }

    pub async fn publish_user_created(
        &self,
        user_id: u64,
        user_name: &str,
        user_email: &str,
        timestamp: &str,
    ) -> Result<String, StreamError> {
        self.publish(&UserEvent::created(user_id, user_name, user_email, timestamp))
            .await
    }

    pub async fn publish_user_deleted(&self, user_id: u64) -> Result<String, StreamError> {
        self.publish(&UserEvent::deleted(user_id)).await
    }

    /// Append a payload verbatim, e.g. one that will not decode.
    pub async fn publish_raw(&self, key: Option<&str>, payload: &str) -> Result<String, StreamError> {
        self.producer.send_raw(key, payload).await
    }
}
