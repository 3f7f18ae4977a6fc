//! The session manager: tracks every lobby session and the ban list.
//!
//! Responsibilities:
//! - Admitting identities (ban check, duplicate check) and creating sessions
//! - Tracking which users are connected/disconnected
//! - Re-keying a session when its user is re-identified
//! - Validating reconnection tokens
//! - Expiring sessions after the grace period and cleaning them up
//!
//! # Concurrency note
//!
//! `SessionManager` is not thread-safe by itself; it uses plain `HashMap`s.
//! The lobby server owns one behind a `tokio::sync::Mutex`. Keys are
//! immutable [`UserIdentity`] values, so a key can never change while it
//! sits in a map.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use lobbyforge_identity::UserIdentity;
use rand::Rng;

use crate::{
    BanList, Session, SessionConfig, SessionError, SessionState,
};

/// Manages all lobby sessions and bans.
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ disconnect() ──→ reconnect()
///    │               │                │
///    ▼               ▼                ▼
/// [Connected]  [Disconnected]    [Connected]
///    │               │
///    │ ban()         ▼ (after grace period)
///    └─────────→ [Expired] ──→ cleanup_expired()
/// ```
pub struct SessionManager {
    /// All sessions, keyed by full identity.
    sessions: HashMap<UserIdentity, Session>,

    /// Reconnection token → identity. Kept in sync with `sessions`,
    /// including across re-identification.
    tokens: HashMap<String, UserIdentity>,

    bans: BanList,

    config: SessionConfig,
}

impl SessionManager {
    /// Creates a new, empty session manager with the given config.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            bans: BanList::new(),
            config,
        }
    }

    /// Admits `identity` and creates a Connected session for it.
    ///
    /// A Disconnected or Expired session for the same identity is replaced
    /// (the old reconnection token stops working).
    ///
    /// # Errors
    /// - [`SessionError::Banned`] if the identity matches a ban under the
    ///   configured [`BanPolicy`](crate::BanPolicy)
    /// - [`SessionError::DuplicateIdentity`] if the identical identity is
    ///   already Connected
    pub fn create(
        &mut self,
        identity: UserIdentity,
    ) -> Result<&Session, SessionError> {
        self.check_banned(&identity)?;

        if let Some(existing) = self.sessions.get(&identity) {
            if existing.is_connected() {
                return Err(SessionError::DuplicateIdentity(identity));
            }
            self.tokens.remove(&existing.reconnect_token);
        }

        let token = generate_token();
        let session = Session {
            identity: identity.clone(),
            state: SessionState::Connected,
            reconnect_token: token.clone(),
        };

        self.tokens.insert(token, identity.clone());
        self.sessions.insert(identity.clone(), session);

        tracing::info!(%identity, "session created");

        Ok(self.sessions.get(&identity).expect("just inserted"))
    }

    /// Marks a user as disconnected and starts the reconnection grace period.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no session exists.
    pub fn disconnect(
        &mut self,
        identity: &UserIdentity,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(identity)
            .ok_or_else(|| SessionError::NotFound(identity.clone()))?;

        // A banned (Expired) session stays Expired.
        if matches!(session.state, SessionState::Connected) {
            session.state = SessionState::Disconnected {
                since: Instant::now(),
            };
            tracing::info!(%identity, "user disconnected, grace period started");
        }
        Ok(())
    }

    /// Reconnects a user using their reconnection token.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`]: token not recognized
    /// - [`SessionError::SessionExpired`]: grace period elapsed
    /// - [`SessionError::DuplicateIdentity`]: session is still Connected
    /// - [`SessionError::Banned`]: the identity was banned meanwhile
    pub fn reconnect(&mut self, token: &str) -> Result<&Session, SessionError> {
        let identity = self
            .tokens
            .get(token)
            .cloned()
            .ok_or(SessionError::InvalidToken)?;

        self.check_banned(&identity)?;

        let grace = self.grace();
        let session = self
            .sessions
            .get_mut(&identity)
            .ok_or(SessionError::InvalidToken)?;

        match &session.state {
            SessionState::Disconnected { since } => {
                if since.elapsed() > grace {
                    session.state = SessionState::Expired;
                    return Err(SessionError::SessionExpired(identity));
                }
                session.state = SessionState::Connected;
                tracing::info!(%identity, "user reconnected");
                Ok(self.sessions.get(&identity).expect("just modified"))
            }
            SessionState::Connected => {
                Err(SessionError::DuplicateIdentity(identity))
            }
            SessionState::Expired => Err(SessionError::SessionExpired(identity)),
        }
    }

    /// Re-identifies a session under a new username. The address,
    /// fingerprint, state, and reconnection token carry over.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if `identity` has no session
    /// - [`SessionError::Identity`] if `new_username` is empty
    /// - [`SessionError::Banned`] / [`SessionError::DuplicateIdentity`] if
    ///   the derived identity would not be admitted
    pub fn rename(
        &mut self,
        identity: &UserIdentity,
        new_username: &str,
    ) -> Result<&Session, SessionError> {
        self.require(identity)?;
        let renamed = identity.with_username(new_username)?;
        self.rekey(identity, renamed)
    }

    /// Re-identifies a session under a recomputed fingerprint.
    ///
    /// # Errors
    /// Same as [`rename`](Self::rename).
    pub fn refingerprint(
        &mut self,
        identity: &UserIdentity,
        hashed_fingerprint: &str,
    ) -> Result<&Session, SessionError> {
        self.require(identity)?;
        let derived = identity.with_fingerprint(hashed_fingerprint)?;
        self.rekey(identity, derived)
    }

    /// Bans `identity`.
    ///
    /// Every session that now matches under the configured policy is moved
    /// to Expired, so it can neither continue nor reconnect. Returns those
    /// sessions' identities so the caller can drop their connections.
    pub fn ban(&mut self, identity: UserIdentity) -> Vec<UserIdentity> {
        tracing::info!(%identity, policy = ?self.config.ban_policy, "identity banned");
        self.bans.insert(identity);

        let mut kicked = Vec::new();
        for session in self.sessions.values_mut() {
            if matches!(session.state, SessionState::Expired) {
                continue;
            }
            if self.bans.matches(&session.identity, self.config.ban_policy) {
                session.state = SessionState::Expired;
                kicked.push(session.identity.clone());
                tracing::info!(identity = %session.identity, "session closed by ban");
            }
        }
        kicked
    }

    /// Lifts the ban on this exact identity. Returns `false` if it was not
    /// banned.
    pub fn unban(&mut self, identity: &UserIdentity) -> bool {
        let removed = self.bans.remove(identity);
        if removed {
            tracing::info!(%identity, "ban lifted");
        }
        removed
    }

    /// Whether `identity` would be refused under the configured policy.
    pub fn is_banned(&self, identity: &UserIdentity) -> bool {
        self.bans.matches(identity, self.config.ban_policy)
    }

    /// Read access to the ban list, e.g. for fingerprint-only audits that
    /// use a different policy than the one enforced at admission.
    pub fn bans(&self) -> &BanList {
        &self.bans
    }

    /// Scans all sessions and expires any that have exceeded the grace
    /// period. Returns the identities that were expired.
    pub fn expire_stale(&mut self) -> Vec<UserIdentity> {
        let grace = self.grace();
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = &session.state {
                if since.elapsed() > grace {
                    session.state = SessionState::Expired;
                    expired.push(session.identity.clone());
                    tracing::info!(
                        identity = %session.identity,
                        "session expired (grace period elapsed)"
                    );
                }
            }
        }

        expired
    }

    /// Removes all expired sessions. Kept separate from
    /// [`expire_stale`](Self::expire_stale) so higher layers can react to
    /// expirations before the data is gone.
    pub fn cleanup_expired(&mut self) {
        self.sessions.retain(|_, session| {
            if matches!(session.state, SessionState::Expired) {
                self.tokens.remove(&session.reconnect_token);
                false
            } else {
                true
            }
        });
    }

    /// Looks up a session by identity.
    pub fn get(&self, identity: &UserIdentity) -> Option<&Session> {
        self.sessions.get(identity)
    }

    /// The identity a reconnection token was issued to, if still valid.
    pub fn identity_for_token(&self, token: &str) -> Option<&UserIdentity> {
        self.tokens.get(token)
    }

    /// Returns the number of sessions (any state).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn grace(&self) -> Duration {
        Duration::from_secs(self.config.reconnect_grace_secs)
    }

    fn require(&self, identity: &UserIdentity) -> Result<(), SessionError> {
        if self.sessions.contains_key(identity) {
            Ok(())
        } else {
            Err(SessionError::NotFound(identity.clone()))
        }
    }

    fn check_banned(&self, identity: &UserIdentity) -> Result<(), SessionError> {
        match self.bans.matching_facet(identity, self.config.ban_policy) {
            Some(facet) => {
                tracing::warn!(%identity, %facet, "refusing banned identity");
                Err(SessionError::Banned(identity.clone(), facet))
            }
            None => Ok(()),
        }
    }

    /// Moves the session stored under `old` to `new`, keeping its state and
    /// token. `old` must exist.
    fn rekey(
        &mut self,
        old: &UserIdentity,
        new: UserIdentity,
    ) -> Result<&Session, SessionError> {
        if *old == new {
            return Ok(self.sessions.get(old).expect("checked by caller"));
        }

        self.check_banned(&new)?;
        if let Some(existing) = self.sessions.get(&new) {
            if existing.is_connected() {
                return Err(SessionError::DuplicateIdentity(new));
            }
            // A stale session already sits under the new key; drop it.
            self.tokens.remove(&existing.reconnect_token);
        }

        let mut session = self.sessions.remove(old).expect("checked by caller");
        session.identity = new.clone();
        self.tokens
            .insert(session.reconnect_token.clone(), new.clone());
        self.sessions.insert(new.clone(), session);

        tracing::info!(from = %old, to = %new, "session re-identified");

        Ok(self.sessions.get(&new).expect("just inserted"))
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
