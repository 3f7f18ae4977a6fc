//! Unified error type for the Lobbyforge server.

use std::path::PathBuf;

use lobbyforge_identity::IdentityError;
use lobbyforge_interrupt::InterruptError;
use lobbyforge_session::SessionError;

use crate::forum::ForumError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so `?` converts sub-crate errors automatically. Interruption never
/// appears here: it is reported as data by the interrupt layer.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// Socket bind/accept/read/write failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A missing identity facet.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// An out-of-range wait argument.
    #[error(transparent)]
    Interrupt(#[from] InterruptError),

    /// Admission or session lifecycle failure (banned, duplicate, ...).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Forum poster configuration or post failure.
    #[error(transparent)]
    Forum(#[from] ForumError),
}

/// Errors raised while loading a [`LobbyConfig`](crate::LobbyConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value parsed but is unusable (e.g. a zero timeout).
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
