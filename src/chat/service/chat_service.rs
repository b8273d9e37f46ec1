//! Chat operations: conversation keys, live feeds and sending.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chat::core::config::{ChatConfig, FeedConfig};
use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::{ConversationKey, ParticipantId};
use crate::chat::core::session::Session;
use crate::chat::feed::LiveFeed;
use crate::chat::model::{ConversationSummary, Message, NewMessage, is_blank};
use crate::chat::store::{DocumentStore, open_store};

/// Chat service over a document store.
///
/// `send` writes the conversation summary and then appends the message as two
/// independent store calls. A failure between them leaves the summary ahead
/// of the message list; this is logged and not repaired.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn DocumentStore>,
    feed: FeedConfig,
}

impl ChatService {
    /// Create a service over an existing store.
    ///
    /// # Errors
    /// Returns an error if the feed settings are invalid.
    pub fn new(store: Arc<dyn DocumentStore>, feed: FeedConfig) -> ChatResult<Self> {
        feed.validate()?;
        Ok(Self { store, feed })
    }

    /// Create a service with the backend selected by `config`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the store cannot be opened.
    pub async fn from_config(config: &ChatConfig) -> ChatResult<Self> {
        config.validate()?;
        let store = open_store(&config.storage).await?;
        Self::new(store, config.feed.clone())
    }

    /// Underlying document store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// Key of the conversation between the session principal and `other`.
    #[must_use]
    pub fn conversation_key(session: &Session, other: &ParticipantId) -> ConversationKey {
        ConversationKey::between(session, other)
    }

    /// Open a live feed over the conversation's messages.
    #[must_use]
    pub fn subscribe(&self, key: &ConversationKey) -> LiveFeed {
        LiveFeed::spawn(self.store(), key.clone(), &self.feed)
    }

    /// Send `text` from `sender` into the conversation between `participant_a` and `participant_b`.
    ///
    /// Returns `Ok(None)` without touching the store when `text` is blank.
    /// Otherwise the summary is created (first message) or its preview updated,
    /// then the message is appended.
    ///
    /// # Errors
    /// Returns an error if any store call fails. The caller keeps its draft.
    pub async fn send(
        &self,
        key: &ConversationKey,
        participant_a: &ParticipantId,
        participant_b: &ParticipantId,
        sender: &ParticipantId,
        text: &str,
    ) -> ChatResult<Option<Message>> {
        if is_blank(text) {
            debug!(conversation = %key, "Skipping blank message");
            return Ok(None);
        }

        let existing = self.store.get_summary(key.clone()).await?;
        if existing.is_some() {
            self.store
                .update_summary(key.clone(), text.to_string())
                .await?;
        } else {
            self.store
                .create_summary(
                    key.clone(),
                    [participant_a.clone(), participant_b.clone()],
                    text.to_string(),
                )
                .await?;
            info!(conversation = %key, "Created conversation");
        }

        let message = match self
            .store
            .append_message(key.clone(), NewMessage::new(sender.clone(), text))
            .await
        {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    conversation = %key,
                    "Summary written but message append failed: {err}"
                );
                return Err(err);
            }
        };

        debug!(conversation = %key, message = %message.id, "Message sent");
        Ok(Some(message))
    }

    /// Send `text` from the session principal to `other`.
    ///
    /// # Errors
    /// Returns an error if any store call fails.
    pub async fn send_as(
        &self,
        session: &Session,
        other: &ParticipantId,
        text: &str,
    ) -> ChatResult<Option<Message>> {
        let key = Self::conversation_key(session, other);
        let me = session.principal();
        self.send(&key, me, other, me, text).await
    }

    /// Conversations the session principal belongs to, most recently updated first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn conversations(&self, session: &Session) -> ChatResult<Vec<ConversationSummary>> {
        self.store
            .list_summaries(session.principal().clone())
            .await
    }

    /// One-shot read of a conversation's messages in feed order.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn history(&self, key: &ConversationKey) -> ChatResult<Vec<Message>> {
        self.store.list_messages(key.clone()).await
    }
}
