//! Process-local document store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{ConversationKey, MessageId, ParticipantId};
use crate::chat::model::{ConversationSummary, Message, NewMessage};
use crate::chat::store::clock::{Clock, SystemClock};
use crate::chat::store::notifier::ChangeNotifier;
use crate::chat::store::{DocumentStore, StoreFuture};

/// In-memory implementation of the document store.
pub struct MemoryDocumentStore {
    clock: Arc<dyn Clock>,
    summaries: DashMap<ConversationKey, ConversationSummary>,
    messages: DashMap<ConversationKey, Vec<Message>>,
    next_seq: AtomicU64,
    notifier: ChangeNotifier,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// Create an empty store stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            summaries: DashMap::new(),
            messages: DashMap::new(),
            next_seq: AtomicU64::new(1),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Number of stored summaries.
    #[must_use]
    pub fn summary_count(&self) -> usize {
        self.summaries.len()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get_summary(
        &self,
        key: ConversationKey,
    ) -> StoreFuture<'_, ChatResult<Option<ConversationSummary>>> {
        Box::pin(async move { Ok(self.summaries.get(&key).map(|entry| entry.value().clone())) })
    }

    fn create_summary(
        &self,
        key: ConversationKey,
        participants: [ParticipantId; 2],
        last_message: String,
    ) -> StoreFuture<'_, ChatResult<ConversationSummary>> {
        Box::pin(async move {
            let updated_at = self.clock.now();
            let summary = match self.summaries.entry(key.clone()) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    existing.last_message = last_message;
                    existing.updated_at = updated_at;
                    existing.clone()
                }
                Entry::Vacant(entry) => entry
                    .insert(ConversationSummary {
                        key,
                        participants,
                        last_message,
                        updated_at,
                    })
                    .value()
                    .clone(),
            };
            Ok(summary)
        })
    }

    fn update_summary(
        &self,
        key: ConversationKey,
        last_message: String,
    ) -> StoreFuture<'_, ChatResult<ConversationSummary>> {
        Box::pin(async move {
            let updated_at = self.clock.now();
            let mut entry = self.summaries.get_mut(&key).ok_or_else(|| {
                ChatError::InvalidRecord(format!("no conversation summary for {key}"))
            })?;
            entry.last_message = last_message;
            entry.updated_at = updated_at;
            Ok(entry.value().clone())
        })
    }

    fn append_message(
        &self,
        key: ConversationKey,
        message: NewMessage,
    ) -> StoreFuture<'_, ChatResult<Message>> {
        Box::pin(async move {
            let stored = {
                let mut messages = self.messages.entry(key.clone()).or_default();
                let stored = Message {
                    id: MessageId::new(),
                    conversation: key.clone(),
                    sender: message.sender,
                    text: message.text,
                    created_at: self.clock.now(),
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                };
                let at = messages.partition_point(|m| m.feed_order(&stored).is_lt());
                messages.insert(at, stored.clone());
                stored
            };
            self.notifier.notify(&key);
            Ok(stored)
        })
    }

    fn list_messages(&self, key: ConversationKey) -> StoreFuture<'_, ChatResult<Vec<Message>>> {
        Box::pin(async move {
            Ok(self
                .messages
                .get(&key)
                .map(|entry| entry.value().clone())
                .unwrap_or_default())
        })
    }

    fn list_summaries(
        &self,
        participant: ParticipantId,
    ) -> StoreFuture<'_, ChatResult<Vec<ConversationSummary>>> {
        Box::pin(async move {
            let mut summaries: Vec<ConversationSummary> = self
                .summaries
                .iter()
                .filter(|entry| entry.value().includes(&participant))
                .map(|entry| entry.value().clone())
                .collect();
            summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(summaries)
        })
    }

    fn watch(&self, key: &ConversationKey) -> watch::Receiver<u64> {
        self.notifier.subscribe(key)
    }
}
