//! Persisted chat records.

pub mod message;
pub mod summary;

pub use message::{Message, NewMessage, is_blank};
pub use summary::ConversationSummary;
