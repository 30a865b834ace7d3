//! Chat message value
//!
//! An immutable message as stored in room history and fanned out to
//! subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{MessageId, UserId};

/// A published chat message.
///
/// Serializes as `{ "id", "sent", "message", "user_id" }` with `sent`
/// in RFC3339.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    id: MessageId,
    #[serde(rename = "sent")]
    sent_at: DateTime<Utc>,
    #[serde(rename = "message")]
    body: String,
    #[serde(rename = "user_id")]
    sender: UserId,
}

impl Message {
    /// Create a new message stamped with the current time.
    pub fn new(sender: UserId, body: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            sent_at: Utc::now(),
            body: body.into(),
            sender,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender(&self) -> UserId {
        self.sender
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }
}
