//! Lobby session management for Lobbyforge.
//!
//! This crate decides who may be in the lobby:
//!
//! 1. **Bans**: identities, or single facets of identities, that are
//!    refused ([`BanList`], [`BanPolicy`])
//! 2. **Session tracking**: who is connected, keyed by full
//!    [`UserIdentity`](lobbyforge_identity::UserIdentity) ([`SessionManager`])
//! 3. **Reconnection**: letting users resume after brief disconnects
//!    (token-based, with configurable grace period)
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby server (above)  ← owns a SessionManager behind a mutex
//!     ↕
//! Session Layer (this crate)  ← bans, duplicates, reconnect tokens
//!     ↕
//! Identity (below)  ← UserIdentity value type
//! ```

mod ban;
mod error;
mod manager;
mod session;

pub use ban::{BanFacet, BanList, BanPolicy};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};
