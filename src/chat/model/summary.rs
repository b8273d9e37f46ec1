//! Conversation summary records used for listing conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::{ConversationKey, ParticipantId};

/// Summary of a conversation: its two participants and a preview of the last message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation key.
    pub key: ConversationKey,
    /// The two participants, in the order of the first sender.
    pub participants: [ParticipantId; 2],
    /// Text of the most recent message.
    pub last_message: String,
    /// Backend time of the most recent write.
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    /// Whether `participant` is one of the two members.
    #[must_use]
    pub fn includes(&self, participant: &ParticipantId) -> bool {
        self.participants.contains(participant)
    }

    /// The member that is not `me`, if `me` is a member.
    #[must_use]
    pub fn other_participant(&self, me: &ParticipantId) -> Option<&ParticipantId> {
        match &self.participants {
            [a, b] if a == me => Some(b),
            [a, b] if b == me => Some(a),
            _ => None,
        }
    }
}
