//! Message records.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::{ConversationKey, MessageId, ParticipantId};

/// A stored chat message. Immutable once appended.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Conversation owning this message.
    pub conversation: ConversationKey,
    /// Author of the message.
    pub sender: ParticipantId,
    /// Text body.
    pub text: String,
    /// Creation time assigned by the backend clock.
    pub created_at: DateTime<Utc>,
    /// Backend insertion sequence, used to break timestamp ties.
    pub seq: u64,
}

impl Message {
    /// Feed ordering: creation time, then insertion sequence.
    #[must_use]
    pub fn feed_order(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then(self.seq.cmp(&other.seq))
    }

    /// Whether this message was written by `participant`.
    #[must_use]
    pub fn is_from(&self, participant: &ParticipantId) -> bool {
        &self.sender == participant
    }
}

/// Client half of an append: the store fills in id, timestamp and sequence.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Author of the message.
    pub sender: ParticipantId,
    /// Text body.
    pub text: String,
}

impl NewMessage {
    /// Build a new message payload.
    #[must_use]
    pub fn new(sender: ParticipantId, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
        }
    }

    /// Blank messages are never sent.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        is_blank(&self.text)
    }
}

/// Whether `text` is empty or whitespace-only.
#[must_use]
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
