//! Document store collaborator for conversation summaries and messages.
//!
//! The store owns timestamps: every write is stamped with the store's
//! [`Clock`], never with a client-provided time. Messages are append-only.
//!
//! Backends:
//! - [`MemoryDocumentStore`]: process-local, used by tests and ephemeral servers
//! - [`SqliteDocumentStore`]: persistent `SQLite` tables via `tokio-rusqlite`

pub mod clock;
pub mod memory_store;
pub mod notifier;
pub mod sqlite_store;
#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;

use crate::chat::core::config::{StorageBackend, StorageConfig};
use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::{ConversationKey, ParticipantId};
use crate::chat::model::{ConversationSummary, Message, NewMessage};

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory_store::MemoryDocumentStore;
pub use notifier::ChangeNotifier;
pub use sqlite_store::SqliteDocumentStore;

/// Boxed future type for document store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Document store trait.
pub trait DocumentStore: Send + Sync {
    /// Point read of a conversation summary.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_summary(
        &self,
        key: ConversationKey,
    ) -> StoreFuture<'_, ChatResult<Option<ConversationSummary>>>;

    /// Create a conversation summary.
    ///
    /// If another writer created it first, only the preview and timestamp are
    /// written; the participant set is never rewritten.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn create_summary(
        &self,
        key: ConversationKey,
        participants: [ParticipantId; 2],
        last_message: String,
    ) -> StoreFuture<'_, ChatResult<ConversationSummary>>;

    /// Update the preview and timestamp of an existing summary.
    ///
    /// # Errors
    /// Returns an error if storage access fails or the summary does not exist.
    fn update_summary(
        &self,
        key: ConversationKey,
        last_message: String,
    ) -> StoreFuture<'_, ChatResult<ConversationSummary>>;

    /// Append a message, stamping it with the store clock and insertion sequence.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn append_message(
        &self,
        key: ConversationKey,
        message: NewMessage,
    ) -> StoreFuture<'_, ChatResult<Message>>;

    /// Load all messages of a conversation in feed order.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_messages(&self, key: ConversationKey) -> StoreFuture<'_, ChatResult<Vec<Message>>>;

    /// Load the summaries of every conversation `participant` belongs to, newest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_summaries(
        &self,
        participant: ParticipantId,
    ) -> StoreFuture<'_, ChatResult<Vec<ConversationSummary>>>;

    /// Watch the message collection of a conversation.
    ///
    /// The revision advances on every append.
    fn watch(&self, key: &ConversationKey) -> watch::Receiver<u64>;
}

/// Open the backend selected by `config`.
///
/// # Errors
/// Returns an error if the backend cannot be initialized.
pub async fn open_store(config: &StorageConfig) -> ChatResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryDocumentStore::new()),
        StorageBackend::Sqlite => Arc::new(SqliteDocumentStore::new(config).await?),
    };
    Ok(store)
}
