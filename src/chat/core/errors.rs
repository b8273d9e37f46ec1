//! Error types for the chat subsystem.

use thiserror::Error;

use crate::chat::core::ids::IdError;

/// Chat subsystem error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Invalid participant identifier.
    #[error("invalid id: {0}")]
    InvalidId(#[from] IdError),
    /// A stored record could not be decoded.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// The backend could not be reached or timed out.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl ChatError {
    /// Check if this error is a transient backend failure worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::TokioSqlite(_) | Self::Sqlite(_)
        )
    }
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ChatError::Unavailable("timeout".to_string()).is_transient());
        assert!(!ChatError::InvalidConfig("x".to_string()).is_transient());
        assert!(!ChatError::InvalidRecord("bad row".to_string()).is_transient());
        assert!(!ChatError::from(IdError::Empty).is_transient());
    }
}
