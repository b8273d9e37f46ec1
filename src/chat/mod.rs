//! Chat subsystem for ReHomeBud.
//!
//! Organized into:
//! - `core`: Identifiers, sessions, configuration and errors
//! - `model`: Message and conversation summary records
//! - `store`: Document store trait with memory and SQLite backends
//! - `feed`: Live feeds delivering full ordered snapshots
//! - `service`: Key derivation, sending and listing
//! - `view`: Single-conversation screen model (draft + live messages)

pub mod core;
pub mod feed;
pub mod model;
pub mod service;
pub mod store;
pub mod view;

// Re-export commonly used types for convenience
pub use self::core::{
    Authenticator, ChatConfig, ChatError, ChatResult, ConversationKey, FeedConfig,
    HeaderAuthenticator, IdError, KEY_SEPARATOR, MessageId, ParticipantId, ServerConfig,
    Session, StorageBackend, StorageConfig,
};
pub use feed::{FeedEvent, FeedState, LiveFeed};
pub use model::{ConversationSummary, Message, NewMessage};
pub use service::ChatService;
pub use store::{
    ChangeNotifier, Clock, DocumentStore, ManualClock, MemoryDocumentStore, SqliteDocumentStore,
    StoreFuture, SystemClock, open_store,
};
pub use view::ConversationView;
