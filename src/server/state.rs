//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::chat::{Authenticator, ChatConfig, ChatResult, ChatService, HeaderAuthenticator};

/// Shared application state.
pub struct AppState {
    /// Chat operations backed by the configured store.
    pub chat: ChatService,
    /// Resolves the caller of each request.
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    /// Wrap an existing service and authenticator.
    #[must_use]
    pub fn new(chat: ChatService, auth: Arc<dyn Authenticator>) -> Arc<Self> {
        Arc::new(Self { chat, auth })
    }

    /// Open the store named by `config` and trust its identity header.
    ///
    /// # Errors
    /// Returns an error if the store cannot be opened or the feed settings are invalid.
    pub async fn from_config(config: &ChatConfig) -> ChatResult<Arc<Self>> {
        let chat = ChatService::from_config(config).await?;
        let auth = Arc::new(HeaderAuthenticator::new(config.server.auth_header.as_str()));
        Ok(Self::new(chat, auth))
    }
}
