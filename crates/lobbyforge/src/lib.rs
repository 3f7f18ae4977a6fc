//! # Lobbyforge
//!
//! Game lobby server core.
//!
//! Lobbyforge admits players by [`UserIdentity`] (username, network address,
//! and hashed machine fingerprint), enforces bans against any of those
//! facets, and keeps sessions alive across short disconnects. Every blocking
//! wait in the server runs under an [`InterruptToken`], so bans and shutdown
//! reach a waiting task as an ordinary result rather than an error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lobbyforge::prelude::*;
//!
//! # async fn demo() -> Result<(), LobbyError> {
//! let config = LobbyConfig::load("lobby.json")?;
//! let server = LobbyServer::builder().config(config).build().await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Wire protocol
//!
//! Newline-delimited text over TCP:
//!
//! ```text
//! C: HELLO alice 3f9c-machine-id      S: OK <reconnect-token>
//! C: RESUME <reconnect-token>         S: OK <reconnect-token>
//! C: NAME alicia                      S: OK alicia
//! C: PING                             S: PONG
//! C: QUIT                             S: BYE
//! ```
//!
//! Any refusal is answered with `ERR <reason>`.

mod config;
mod connections;
mod error;
pub mod forum;
mod handler;
mod housekeeping;
mod server;

pub use config::LobbyConfig;
pub use connections::ConnectionId;
pub use error::{ConfigError, LobbyError};
pub use housekeeping::run_housekeeping;
pub use server::{LobbyHandle, LobbyServer, LobbyServerBuilder};

pub use lobbyforge_identity::{hash_fingerprint, UserIdentity};
pub use lobbyforge_interrupt::InterruptToken;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).try_init()
}

pub mod prelude {
    pub use crate::forum::{ForumPoster, ForumPosterConfig, TurnSummary};
    pub use crate::{
        hash_fingerprint, ConfigError, InterruptToken, LobbyConfig, LobbyError,
        LobbyHandle, LobbyServer, LobbyServerBuilder, UserIdentity,
    };
    pub use lobbyforge_interrupt::{
        await_completion, await_result, sleep, sleep_for, Completion, Interruption,
    };
    pub use lobbyforge_session::{BanPolicy, SessionConfig, SessionState};
}
