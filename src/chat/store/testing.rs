//! Fault-injecting store wrapper for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{ConversationKey, ParticipantId};
use crate::chat::model::{ConversationSummary, Message, NewMessage};
use crate::chat::store::{DocumentStore, MemoryDocumentStore, StoreFuture};

/// Wraps a [`MemoryDocumentStore`], counts backend calls and fails on demand.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryDocumentStore,
    pub read_failures: AtomicUsize,
    pub append_failures: AtomicUsize,
    pub summary_failures: AtomicUsize,
    /// Summary reads that report "missing" without consulting the inner store.
    pub missed_summaries: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FaultyStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn unavailable<'a, T: Send + 'a>() -> StoreFuture<'a, ChatResult<T>> {
    Box::pin(async { Err(ChatError::Unavailable("network down".to_string())) })
}

impl DocumentStore for FaultyStore {
    fn get_summary(
        &self,
        key: ConversationKey,
    ) -> StoreFuture<'_, ChatResult<Option<ConversationSummary>>> {
        self.record();
        if take_failure(&self.summary_failures) {
            return unavailable();
        }
        if take_failure(&self.missed_summaries) {
            return Box::pin(async { Ok(None) });
        }
        self.inner.get_summary(key)
    }

    fn create_summary(
        &self,
        key: ConversationKey,
        participants: [ParticipantId; 2],
        last_message: String,
    ) -> StoreFuture<'_, ChatResult<ConversationSummary>> {
        self.record();
        self.inner.create_summary(key, participants, last_message)
    }

    fn update_summary(
        &self,
        key: ConversationKey,
        last_message: String,
    ) -> StoreFuture<'_, ChatResult<ConversationSummary>> {
        self.record();
        self.inner.update_summary(key, last_message)
    }

    fn append_message(
        &self,
        key: ConversationKey,
        message: NewMessage,
    ) -> StoreFuture<'_, ChatResult<Message>> {
        self.record();
        if take_failure(&self.append_failures) {
            return unavailable();
        }
        self.inner.append_message(key, message)
    }

    fn list_messages(&self, key: ConversationKey) -> StoreFuture<'_, ChatResult<Vec<Message>>> {
        self.record();
        if take_failure(&self.read_failures) {
            return unavailable();
        }
        self.inner.list_messages(key)
    }

    fn list_summaries(
        &self,
        participant: ParticipantId,
    ) -> StoreFuture<'_, ChatResult<Vec<ConversationSummary>>> {
        self.record();
        self.inner.list_summaries(participant)
    }

    fn watch(&self, key: &ConversationKey) -> watch::Receiver<u64> {
        self.record();
        self.inner.watch(key)
    }
}
