//! Per-conversation change notification shared by the store backends.

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::trace;

use crate::chat::core::ids::ConversationKey;

/// Revision counters, one `watch` channel per watched conversation.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    channels: DashMap<ConversationKey, watch::Sender<u64>>,
}

impl ChangeNotifier {
    /// Create an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes of `key`. The current revision is marked as seen.
    #[must_use]
    pub fn subscribe(&self, key: &ConversationKey) -> watch::Receiver<u64> {
        self.channels
            .entry(key.clone())
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    /// Advance the revision of `key`, waking every watcher.
    pub fn notify(&self, key: &ConversationKey) {
        if let Some(sender) = self.channels.get(key) {
            sender.send_modify(|revision| *revision = revision.wrapping_add(1));
            trace!(conversation = %key, revision = *sender.borrow(), "Notified watchers");
        }
        self.channels
            .remove_if(key, |_, sender| sender.receiver_count() == 0);
    }

    /// Number of conversations with at least one channel allocated.
    #[must_use]
    pub fn watched(&self) -> usize {
        self.channels.len()
    }
}
