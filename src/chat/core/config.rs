//! Configuration for the chat subsystem.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::session::HeaderAuthenticator;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Document store settings.
    pub storage: StorageConfig,
    /// Live feed settings.
    pub feed: FeedConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl ChatConfig {
    /// Build a configuration from defaults plus `REHOMEBUD_*` environment overrides.
    ///
    /// Recognized variables: `REHOMEBUD_STORAGE` (`memory` or `sqlite`),
    /// `REHOMEBUD_DB`, `REHOMEBUD_PORT`, `REHOMEBUD_AUTH_HEADER`.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ChatConfig::from_env`] with an arbitrary variable source.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(backend) = lookup("REHOMEBUD_STORAGE") {
            config.storage.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "sqlite" => StorageBackend::Sqlite,
                other => {
                    return Err(ChatError::InvalidConfig(format!(
                        "unknown storage backend: {other}"
                    )));
                }
            };
        }

        if let Some(path) = lookup("REHOMEBUD_DB") {
            config.storage.sqlite_path = PathBuf::from(path);
        }

        if let Some(port) = lookup("REHOMEBUD_PORT") {
            config.server.port = port
                .trim()
                .parse()
                .map_err(|_| ChatError::InvalidConfig(format!("invalid port: {port}")))?;
        }

        if let Some(header) = lookup("REHOMEBUD_AUTH_HEADER") {
            config.server.auth_header = header;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        self.storage.validate()?;
        self.feed.validate()?;

        if self.server.auth_header.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "server.auth_header must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Which document store backs the chat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local store; contents are lost on restart.
    Memory,
    /// `SQLite` file store.
    #[default]
    Sqlite,
}

/// Storage configuration for chat data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend.
    pub backend: StorageBackend,
    /// `SQLite` database path (`:memory:` for a private in-memory database).
    pub sqlite_path: PathBuf,
    /// Conversation summary table name.
    pub summary_table: String,
    /// Message table name.
    pub message_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            sqlite_path: PathBuf::from("rehomebud_chat.sqlite"),
            summary_table: "chat_summaries".to_string(),
            message_table: "chat_messages".to_string(),
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> ChatResult<()> {
        for (name, table) in [
            ("summary_table", &self.summary_table),
            ("message_table", &self.message_table),
        ] {
            let valid = !table.is_empty()
                && table
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
            if !valid {
                return Err(ChatError::InvalidConfig(format!(
                    "storage.{name} must be a non-empty [A-Za-z0-9_] identifier"
                )));
            }
        }

        if self.summary_table == self.message_table {
            return Err(ChatError::InvalidConfig(
                "storage.summary_table and storage.message_table must differ".to_string(),
            ));
        }

        Ok(())
    }
}

/// Live feed settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// First resubscription delay after a failure, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on the resubscription delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Factor applied to the delay after each consecutive failure.
    pub backoff_multiplier: u32,
    /// Pending events buffered per subscriber.
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 250,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2,
            channel_capacity: 16,
        }
    }
}

impl FeedConfig {
    /// First resubscription delay.
    #[must_use]
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Maximum resubscription delay.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Validate feed settings.
    ///
    /// # Errors
    /// Returns an error if any values are out of range.
    pub fn validate(&self) -> ChatResult<()> {
        if self.initial_backoff_ms == 0 {
            return Err(ChatError::InvalidConfig(
                "feed.initial_backoff_ms must be > 0".to_string(),
            ));
        }

        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ChatError::InvalidConfig(
                "feed.max_backoff_ms must be >= feed.initial_backoff_ms".to_string(),
            ));
        }

        if self.backoff_multiplier == 0 {
            return Err(ChatError::InvalidConfig(
                "feed.backoff_multiplier must be > 0".to_string(),
            ));
        }

        if self.channel_capacity == 0 {
            return Err(ChatError::InvalidConfig(
                "feed.channel_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Header carrying the authenticated participant id.
    pub auth_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            auth_header: HeaderAuthenticator::DEFAULT_HEADER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ChatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.feed.initial_backoff(), Duration::from_millis(250));
    }

    #[test]
    fn test_env_overrides() {
        let config = ChatConfig::from_lookup(lookup_from(&[
            ("REHOMEBUD_STORAGE", "Memory"),
            ("REHOMEBUD_DB", "/tmp/chat.db"),
            ("REHOMEBUD_PORT", "8080"),
            ("REHOMEBUD_AUTH_HEADER", "x-uid"),
        ]))
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.sqlite_path, PathBuf::from("/tmp/chat.db"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.auth_header, "x-uid");
    }

    #[test]
    fn test_env_rejects_bad_values() {
        assert!(ChatConfig::from_lookup(lookup_from(&[("REHOMEBUD_STORAGE", "redis")])).is_err());
        assert!(ChatConfig::from_lookup(lookup_from(&[("REHOMEBUD_PORT", "http")])).is_err());
        assert!(ChatConfig::from_lookup(lookup_from(&[("REHOMEBUD_AUTH_HEADER", " ")])).is_err());
    }

    #[test]
    fn test_feed_validation() {
        let mut feed = FeedConfig::default();
        feed.max_backoff_ms = 10;
        assert!(feed.validate().is_err());

        let mut feed = FeedConfig::default();
        feed.channel_capacity = 0;
        assert!(feed.validate().is_err());

        let mut feed = FeedConfig::default();
        feed.backoff_multiplier = 0;
        assert!(feed.validate().is_err());
    }

    #[test]
    fn test_storage_table_names_validated() {
        let mut config = ChatConfig::default();
        config.storage.message_table = "messages; DROP".to_string();
        assert!(config.validate().is_err());

        let mut config = ChatConfig::default();
        config.storage.message_table = config.storage.summary_table.clone();
        assert!(config.validate().is_err());
    }
}
