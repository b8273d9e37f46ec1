//! Screen model for a single conversation.
//!
//! `Unsubscribed -> Subscribing -> Live (<-> Stale) -> Unsubscribed`. A failed
//! send leaves the view `Live` with the draft untouched.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::{ConversationKey, ParticipantId};
use crate::chat::core::session::Session;
use crate::chat::feed::{FeedEvent, FeedState, LiveFeed};
use crate::chat::model::Message;
use crate::chat::service::ChatService;

/// One open conversation: live messages plus the draft being typed.
pub struct ConversationView {
    service: ChatService,
    session: Session,
    other: ParticipantId,
    key: ConversationKey,
    feed: Option<LiveFeed>,
    state: watch::Receiver<FeedState>,
    messages: Arc<[Message]>,
    draft: String,
    stale_reason: Option<String>,
}

impl ConversationView {
    /// Open the conversation between the session principal and `other`.
    #[must_use]
    pub fn open(service: &ChatService, session: Session, other: ParticipantId) -> Self {
        let key = ChatService::conversation_key(&session, &other);
        let feed = service.subscribe(&key);
        let state = feed.state_changes();
        debug!(conversation = %key, "Opened conversation view");
        Self {
            service: service.clone(),
            session,
            other,
            key,
            feed: Some(feed),
            state,
            messages: Arc::from(Vec::new()),
            draft: String::new(),
            stale_reason: None,
        }
    }

    /// Conversation key.
    #[must_use]
    pub const fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// The other participant.
    #[must_use]
    pub const fn other(&self) -> &ParticipantId {
        &self.other
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    /// Latest delivered messages, in feed order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Why the messages are stale, while the feed is retrying.
    #[must_use]
    pub fn stale_reason(&self) -> Option<&str> {
        self.stale_reason.as_deref()
    }

    /// Text being composed.
    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the text being composed.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Whether `message` was written by the session principal.
    #[must_use]
    pub fn is_mine(&self, message: &Message) -> bool {
        message.is_from(self.session.principal())
    }

    /// Wait for the next feed event and apply it.
    ///
    /// Returns the resulting state, or `None` once the view is closed.
    pub async fn next_event(&mut self) -> Option<FeedState> {
        let event = self.feed.as_mut()?.next_event().await?;
        match event {
            FeedEvent::Snapshot(messages) => {
                self.messages = messages;
                self.stale_reason = None;
            }
            FeedEvent::Stale { error, .. } => {
                self.stale_reason = Some(error);
            }
        }
        Some(self.state())
    }

    /// Send the draft. The draft is cleared only once the message is stored.
    ///
    /// Returns `Ok(None)` for a blank draft.
    ///
    /// # Errors
    /// Returns the store error; the draft is kept for a retry.
    pub async fn submit(&mut self) -> ChatResult<Option<Message>> {
        let sent = self
            .service
            .send_as(&self.session, &self.other, &self.draft)
            .await?;
        if sent.is_some() {
            self.draft.clear();
        }
        Ok(sent)
    }

    /// Leave the conversation and release the live feed.
    pub fn close(&mut self) {
        if self.feed.take().is_some() {
            debug!(conversation = %self.key, "Closed conversation view");
        }
    }
}
