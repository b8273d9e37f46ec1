//! Authenticated principal, threaded explicitly through chat operations.

use axum::http::HeaderMap;
use tracing::debug;

use crate::chat::core::ids::ParticipantId;

/// The currently authenticated principal.
///
/// A `Session` can only be built from a valid [`ParticipantId`], so any
/// operation that takes one never runs unauthenticated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    principal: ParticipantId,
}

impl Session {
    /// Open a session for an authenticated participant.
    #[must_use]
    pub const fn new(principal: ParticipantId) -> Self {
        Self { principal }
    }

    /// The authenticated participant.
    #[must_use]
    pub const fn principal(&self) -> &ParticipantId {
        &self.principal
    }
}

/// External authentication collaborator.
///
/// Implementations only resolve who the caller is; login, logout and
/// session lifecycle belong to the auth provider.
pub trait Authenticator: Send + Sync {
    /// Resolve the caller from request headers, if authenticated.
    fn authenticate(&self, headers: &HeaderMap) -> Option<Session>;
}

/// Trusts an identity header injected by an upstream auth gateway.
#[derive(Clone, Debug)]
pub struct HeaderAuthenticator {
    header: String,
}

impl HeaderAuthenticator {
    /// Default header carrying the authenticated participant id.
    pub const DEFAULT_HEADER: &'static str = "x-rehomebud-user";

    /// Build an authenticator reading the given header.
    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
        }
    }
}

impl Default for HeaderAuthenticator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HEADER)
    }
}

impl Authenticator for HeaderAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Session> {
        let value = headers.get(self.header.as_str())?.to_str().ok()?;
        match ParticipantId::new(value) {
            Ok(principal) => Some(Session::new(principal)),
            Err(err) => {
                debug!(header = %self.header, "Rejected identity header: {err}");
                None
            }
        }
    }
}
