//! `SQLite` document store for conversation summaries and messages.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use tokio::sync::watch;
use tokio_rusqlite::Connection;
use tracing::info;

use crate::chat::core::config::StorageConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{ConversationKey, MessageId, ParticipantId};
use crate::chat::model::{ConversationSummary, Message, NewMessage};
use crate::chat::store::clock::{Clock, SystemClock};
use crate::chat::store::notifier::ChangeNotifier;
use crate::chat::store::{DocumentStore, StoreFuture};

/// Raw summary row: key, participant a, participant b, last message, `updated_at` millis.
type SummaryRow = (String, String, String, String, i64);

/// Raw message row: seq, id, sender, text, `created_at` millis.
type MessageRow = (i64, String, String, String, i64);

/// `SQLite` implementation of the document store.
pub struct SqliteDocumentStore {
    conn: Connection,
    summary_table: String,
    message_table: String,
    clock: Arc<dyn Clock>,
    notifier: ChangeNotifier,
}

impl SqliteDocumentStore {
    /// Initialize the store, creating tables if needed.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn new(config: &StorageConfig) -> ChatResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    /// Initialize the store with a custom backend clock.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn with_clock(config: &StorageConfig, clock: Arc<dyn Clock>) -> ChatResult<Self> {
        let conn = if config.sqlite_path == Path::new(":memory:") {
            Connection::open_in_memory().await?
        } else {
            Connection::open(&config.sqlite_path).await?
        };
        let summary_table = config.summary_table.clone();
        let message_table = config.message_table.clone();
        let summaries = summary_table.clone();
        let messages = message_table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {summaries} (
                    conversation_key TEXT PRIMARY KEY,
                    participant_a TEXT NOT NULL,
                    participant_b TEXT NOT NULL,
                    last_message TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{summaries}_a
                    ON {summaries} (participant_a, updated_at DESC);
                CREATE INDEX IF NOT EXISTS idx_{summaries}_b
                    ON {summaries} (participant_b, updated_at DESC);
                CREATE TABLE IF NOT EXISTS {messages} (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    conversation_key TEXT NOT NULL,
                    sender TEXT NOT NULL,
                    text TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{messages}_conversation_ts
                    ON {messages} (conversation_key, created_at, seq);"
            ))?;
            Ok(())
        })
        .await?;

        info!(path = %config.sqlite_path.display(), "Opened SQLite chat store");

        Ok(Self {
            conn,
            summary_table,
            message_table,
            clock,
            notifier: ChangeNotifier::new(),
        })
    }

    async fn load_summary(&self, key: String) -> ChatResult<Option<ConversationSummary>> {
        let table = self.summary_table.clone();
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!(
                            "SELECT conversation_key, participant_a, participant_b, last_message, updated_at
                             FROM {table} WHERE conversation_key = ?1"
                        ),
                        rusqlite::params![key],
                        summary_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.map(decode_summary).transpose()
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get_summary(
        &self,
        key: ConversationKey,
    ) -> StoreFuture<'_, ChatResult<Option<ConversationSummary>>> {
        Box::pin(async move { self.load_summary(key.as_str().to_string()).await })
    }

    fn create_summary(
        &self,
        key: ConversationKey,
        participants: [ParticipantId; 2],
        last_message: String,
    ) -> StoreFuture<'_, ChatResult<ConversationSummary>> {
        Box::pin(async move {
            let table = self.summary_table.clone();
            let key_str = key.as_str().to_string();
            let [a, b] = participants;
            let (a, b) = (String::from(a), String::from(b));
            let updated_at = self.clock.now().timestamp_millis();

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table}
                             (conversation_key, participant_a, participant_b, last_message, updated_at)
                             VALUES (?1, ?2, ?3, ?4, ?5)
                             ON CONFLICT(conversation_key) DO UPDATE SET
                                last_message = excluded.last_message,
                                updated_at = excluded.updated_at"
                        ),
                        rusqlite::params![key_str, a, b, last_message, updated_at],
                    )?;
                    Ok(())
                })
                .await?;

            self.load_summary(key.as_str().to_string())
                .await?
                .ok_or_else(|| ChatError::InvalidRecord(format!("summary {key} vanished")))
        })
    }

    fn update_summary(
        &self,
        key: ConversationKey,
        last_message: String,
    ) -> StoreFuture<'_, ChatResult<ConversationSummary>> {
        Box::pin(async move {
            let table = self.summary_table.clone();
            let key_str = key.as_str().to_string();
            let updated_at = self.clock.now().timestamp_millis();

            let changed = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        &format!(
                            "UPDATE {table} SET last_message = ?1, updated_at = ?2
                             WHERE conversation_key = ?3"
                        ),
                        rusqlite::params![last_message, updated_at, key_str],
                    )?;
                    Ok(changed)
                })
                .await?;

            if changed == 0 {
                return Err(ChatError::InvalidRecord(format!(
                    "no conversation summary for {key}"
                )));
            }

            self.load_summary(key.as_str().to_string())
                .await?
                .ok_or_else(|| ChatError::InvalidRecord(format!("summary {key} vanished")))
        })
    }

    fn append_message(
        &self,
        key: ConversationKey,
        message: NewMessage,
    ) -> StoreFuture<'_, ChatResult<Message>> {
        Box::pin(async move {
            let table = self.message_table.clone();
            let id = MessageId::new();
            let created_at = self.clock.now();
            let created_ms = created_at.timestamp_millis();
            let key_str = key.as_str().to_string();
            let sender = message.sender.as_str().to_string();
            let text = message.text.clone();

            let seq = self
                .conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (id, conversation_key, sender, text, created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5)"
                        ),
                        rusqlite::params![id.to_string(), key_str, sender, text, created_ms],
                    )?;
                    Ok(conn.last_insert_rowid())
                })
                .await?;

            let stored = Message {
                id,
                conversation: key,
                sender: message.sender,
                text: message.text,
                created_at: from_millis(created_ms)?,
                seq: to_seq(seq)?,
            };
            self.notifier.notify(&stored.conversation);
            Ok(stored)
        })
    }

    fn list_messages(&self, key: ConversationKey) -> StoreFuture<'_, ChatResult<Vec<Message>>> {
        Box::pin(async move {
            let table = self.message_table.clone();
            let key_str = key.as_str().to_string();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT seq, id, sender, text, created_at
                         FROM {table}
                         WHERE conversation_key = ?1
                         ORDER BY created_at ASC, seq ASC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![key_str], |row| {
                            let seq: i64 = row.get(0)?;
                            let id: String = row.get(1)?;
                            let sender: String = row.get(2)?;
                            let text: String = row.get(3)?;
                            let created_at: i64 = row.get(4)?;
                            Ok((seq, id, sender, text, created_at))
                        })?
                        .collect::<Result<Vec<MessageRow>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            let mut messages = Vec::with_capacity(rows.len());
            for (seq, id, sender, text, created_at) in rows {
                messages.push(Message {
                    id: id.parse().map_err(|err| {
                        ChatError::InvalidRecord(format!("invalid message id: {err}"))
                    })?,
                    conversation: key.clone(),
                    sender: ParticipantId::new(sender)?,
                    text,
                    created_at: from_millis(created_at)?,
                    seq: to_seq(seq)?,
                });
            }
            Ok(messages)
        })
    }

    fn list_summaries(
        &self,
        participant: ParticipantId,
    ) -> StoreFuture<'_, ChatResult<Vec<ConversationSummary>>> {
        Box::pin(async move {
            let table = self.summary_table.clone();
            let who = participant.as_str().to_string();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT conversation_key, participant_a, participant_b, last_message, updated_at
                         FROM {table}
                         WHERE participant_a = ?1 OR participant_b = ?1
                         ORDER BY updated_at DESC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![who], summary_row)?
                        .collect::<Result<Vec<SummaryRow>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(decode_summary).collect()
        })
    }

    fn watch(&self, key: &ConversationKey) -> watch::Receiver<u64> {
        self.notifier.subscribe(key)
    }
}

fn summary_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_summary(row: SummaryRow) -> ChatResult<ConversationSummary> {
    let (key, a, b, last_message, updated_at) = row;
    Ok(ConversationSummary {
        key: ConversationKey::from_raw(key),
        participants: [ParticipantId::new(a)?, ParticipantId::new(b)?],
        last_message,
        updated_at: from_millis(updated_at)?,
    })
}

fn from_millis(ms: i64) -> ChatResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| ChatError::InvalidRecord("invalid timestamp".to_string()))
}

fn to_seq(seq: i64) -> ChatResult<u64> {
    u64::try_from(seq).map_err(|_| ChatError::InvalidRecord("invalid sequence".to_string()))
}
