//! User lifecycle events read from the `user-events` stream.
//!
//! Wire format (JSON):
//!
//! ```json
//! {"event_type":"user_created","user_id":42,"user_name":"Ada","user_email":"ada@example.com","timestamp":"2024-05-01T10:00:00Z"}
//! ```
//!
//! Only `event_type` and `user_id` are required. Deletion events usually carry
//! nothing else but a null `timestamp`.

use serde::{Deserialize, Serialize};
use std::fmt;
use stream_worker::StreamJob;

const USER_CREATED: &str = "user_created";
const USER_DELETED: &str = "user_deleted";

/// The `event_type` tag, decoded once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserEventKind {
    Created,
    Deleted,
    /// Any tag this service does not act on, kept verbatim
    Unknown(String),
}

impl UserEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            UserEventKind::Created => USER_CREATED,
            UserEventKind::Deleted => USER_DELETED,
            UserEventKind::Unknown(tag) => tag,
        }
    }
}

impl From<String> for UserEventKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            USER_CREATED => UserEventKind::Created,
            USER_DELETED => UserEventKind::Deleted,
            _ => UserEventKind::Unknown(tag),
        }
    }
}

impl From<UserEventKind> for String {
    fn from(kind: UserEventKind) -> Self {
        match kind {
            UserEventKind::Unknown(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for UserEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user lifecycle transition as published by the user service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    pub event_type: UserEventKind,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Opaque producer timestamp
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl UserEvent {
    pub fn created(
        user_id: u64,
        user_name: impl Into<String>,
        user_email: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            event_type: UserEventKind::Created,
            user_id,
            user_name: Some(user_name.into()),
            user_email: Some(user_email.into()),
            timestamp: Some(timestamp.into()),
        }
    }

    pub fn deleted(user_id: u64) -> Self {
        Self {
            event_type: UserEventKind::Deleted,
            user_id,
            user_name: None,
            user_email: None,
            timestamp: None,
        }
    }

    /// The user id as stored in the `tasks.user_id` column.
    pub fn owner_id(&self) -> Option<i64> {
        i64::try_from(self.user_id).ok()
    }
}

impl StreamJob for UserEvent {
    fn job_id(&self) -> String {
        format!("{}:{}", self.event_type, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_user_created() {
        let event: UserEvent = serde_json::from_str(
            r#"{"event_type":"user_created","user_id":42,"user_name":"Ada","user_email":"ada@example.com","timestamp":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(event.event_type, UserEventKind::Created);
        assert_eq!(event.user_id, 42);
        assert_eq!(event.user_name.as_deref(), Some("Ada"));
        assert_eq!(event.job_id(), "user_created:42");
    }

    #[test]
    fn test_decode_minimal_user_deleted() {
        let event: UserEvent =
            serde_json::from_str(r#"{"event_type":"user_deleted","user_id":42,"timestamp":null}"#)
                .unwrap();

        assert_eq!(event, UserEvent::deleted(42));
    }

    #[test]
    fn test_unknown_tag_is_kept() {
        let event: UserEvent =
            serde_json::from_str(r#"{"event_type":"user_renamed","user_id":1}"#).unwrap();
        assert_eq!(event.event_type, UserEventKind::Unknown("user_renamed".into()));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "user_renamed");
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        assert!(serde_json::from_str::<UserEvent>("not json").is_err());
        assert!(serde_json::from_str::<UserEvent>(r#"{"event_type":"user_created"}"#).is_err());
        assert!(
            serde_json::from_str::<UserEvent>(r#"{"event_type":"user_created","user_id":-1}"#)
                .is_err()
        );
    }

    #[test]
    fn test_owner_id_range() {
        assert_eq!(UserEvent::deleted(42).owner_id(), Some(42));
        assert_eq!(UserEvent::deleted(u64::MAX).owner_id(), None);
    }

    #[test]
    fn test_deleted_wire_shape() {
        let json = serde_json::to_value(UserEvent::deleted(5)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event_type":"user_deleted","user_id":5,"timestamp":null})
        );
    }
}
