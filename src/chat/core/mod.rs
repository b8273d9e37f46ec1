//! Core chat types: identifiers, sessions, configuration and errors.

pub mod config;
pub mod errors;
pub mod ids;
pub mod session;

pub use config::{ChatConfig, FeedConfig, ServerConfig, StorageBackend, StorageConfig};
pub use errors::{ChatError, ChatResult};
pub use ids::{ConversationKey, IdError, KEY_SEPARATOR, MessageId, ParticipantId};
pub use session::{Authenticator, HeaderAuthenticator, Session};
