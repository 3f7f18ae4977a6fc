//! Session types: the data structures that represent a lobby user's connection.
//!
//! A "session" is the server's record of a connected user. It tracks:
//! - WHO the user is (`UserIdentity`)
//! - WHAT state they're in (connected, disconnected, expired)
//! - HOW they can reconnect (a secret token)
//! - WHEN they disconnected (so we know when to expire them)

use std::time::Instant;

use lobbyforge_identity::UserIdentity;
use serde::{Deserialize, Serialize};

use crate::BanPolicy;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long (in seconds) a disconnected user has to reconnect
    /// before their session is permanently expired.
    ///
    /// Default: 30 seconds. Set to 0 to disable reconnection entirely.
    pub reconnect_grace_secs: u64,

    /// Which facets of a banned identity are enough to refuse a newcomer.
    ///
    /// Default: [`BanPolicy::Any`].
    pub ban_policy: BanPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
            ban_policy: BanPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The current state of a user's session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(timeout)──→ Expired
///       ↑                            │
///       └────────(reconnect)─────────┘
/// ```
///
/// Banning a user also moves their session straight to `Expired`.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// User is actively connected.
    Connected,

    /// User disconnected at the given instant.
    /// They have until `since + grace_period` to reconnect.
    Disconnected { since: Instant },

    /// Session has expired and will be cleaned up.
    Expired,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single user's session in the lobby.
#[derive(Debug, Clone)]
pub struct Session {
    /// Who this session belongs to. Replaced, never mutated, when the user
    /// is re-identified.
    pub identity: UserIdentity,

    /// Current lifecycle state.
    pub state: SessionState,

    /// A secret token the user can present to resume after a disconnect.
    /// 32 lowercase hex characters (128 bits of randomness).
    pub reconnect_token: String,
}

impl Session {
    /// Whether the session is in the `Connected` state.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected)
    }
}
