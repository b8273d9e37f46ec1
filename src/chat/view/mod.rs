//! Client-side conversation screen model.

pub mod conversation_view;

pub use conversation_view::ConversationView;
