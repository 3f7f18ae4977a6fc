//! Error types for the session layer.

use lobbyforge_identity::{IdentityError, UserIdentity};

use crate::BanFacet;

/// Errors that can occur during session management.
///
/// These cover admission (bans, duplicates), re-identification, and the
/// reconnect lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The identity matches a ban under the configured policy.
    #[error("{0} is banned (matched on {1})")]
    Banned(UserIdentity, BanFacet),

    /// An identical identity already has a Connected session.
    #[error("{0} already has an active session")]
    DuplicateIdentity(UserIdentity),

    /// No session exists for the given identity.
    #[error("session not found for {0}")]
    NotFound(UserIdentity),

    /// The reconnection token doesn't match what the server issued.
    #[error("invalid reconnection token")]
    InvalidToken,

    /// The session's reconnection grace period has elapsed.
    #[error("session expired for {0}")]
    SessionExpired(UserIdentity),

    /// Deriving a new identity failed (empty username or fingerprint).
    #[error(transparent)]
    Identity(#[from] IdentityError),
}
