// File: src/chat/core/ids.rs

//! Identifier types for the chat subsystem.
//!
//! ## Conversation identity
//! A conversation between two participants has no stored membership index.
//! Its key is rebuilt independently by either side from the unordered pair
//! of participant identifiers: the lexicographically smaller identifier, the
//! [`KEY_SEPARATOR`], then the larger one.
//!
//! Keys are unique per pair as long as participant identifiers never contain
//! the separator. Identifiers that do contain it are still accepted, since
//! upstream auth providers hand out such identifiers.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: enables `UUIDv7` generation for [`MessageId`].

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::core::session::Session;

/// Separator placed between the two participant identifiers of a [`ConversationKey`].
pub const KEY_SEPARATOR: char = '_';

/// Generate an ID intended to have good DB insert locality.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

// ===== Participant IDs ======================================================

/// Errors returned when parsing/validating a [`ParticipantId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "participant id must not be empty"),
        }
    }
}

impl std::error::Error for IdError {}

/// Opaque identifier of a chat participant, as issued by the auth provider.
///
/// Ordering is the byte-wise lexicographic ordering of the underlying string,
/// which is the ordering used to build a [`ConversationKey`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Build a validated `ParticipantId`. The input is kept verbatim.
    ///
    /// # Errors
    /// Returns [`IdError::Empty`] if the input is empty or only whitespace.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IdError> {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(raw.to_owned()))
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identifier contains the conversation key separator.
    #[inline]
    #[must_use]
    pub fn contains_separator(&self) -> bool {
        self.0.contains(KEY_SEPARATOR)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<ParticipantId> for String {
    fn from(value: ParticipantId) -> Self {
        value.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// ===== Conversation keys ====================================================

/// Canonical key of the conversation between two participants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Derive the key for the unordered pair `{a, b}`.
    ///
    /// `derive(a, b) == derive(b, a)` for every pair.
    #[must_use]
    pub fn derive(a: &ParticipantId, b: &ParticipantId) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let mut key = String::with_capacity(low.0.len() + high.0.len() + 1);
        key.push_str(low.as_str());
        key.push(KEY_SEPARATOR);
        key.push_str(high.as_str());
        Self(key)
    }

    /// Derive the key between the authenticated principal and another participant.
    #[must_use]
    pub fn between(session: &Session, other: &ParticipantId) -> Self {
        Self::derive(session.principal(), other)
    }

    /// Wrap a key that was previously derived (e.g. read back from storage).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// ===== Message IDs ==========================================================

/// Identifier of a stored message, assigned by the store on append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl Default for MessageId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl MessageId {
    /// Create a new identifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(uuid_time_ordered())
    }

    /// Borrow the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
