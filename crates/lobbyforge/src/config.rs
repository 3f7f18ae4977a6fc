//! Lobby server configuration.

use std::path::Path;
use std::time::Duration;

use lobbyforge_session::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Everything the lobby server needs to start.
///
/// Every field has a default, so a config file only has to name the values
/// it changes:
///
/// ```json
/// { "bind_addr": "0.0.0.0:3304", "session": { "ban_policy": "fingerprint" } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Address the listener binds to. Default: `127.0.0.1:3304`.
    pub bind_addr: String,

    /// How long a new connection has to send its `HELLO`/`RESUME` line.
    pub handshake_timeout_ms: u64,

    /// How long a connected client may stay silent before it is dropped.
    pub idle_timeout_ms: u64,

    /// How often stale sessions are expired and cleaned up.
    pub housekeeping_interval_ms: u64,

    /// Pause before retrying after a failed `accept`.
    pub accept_backoff_ms: u64,

    /// Longest accepted command line, newline excluded. A longer line is
    /// answered with `ERR line too long` and the connection is closed.
    pub max_line_bytes: usize,

    pub session: SessionConfig,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3304".to_string(),
            handshake_timeout_ms: 5_000,
            idle_timeout_ms: 60_000,
            housekeeping_interval_ms: 5_000,
            accept_backoff_ms: 100,
            max_line_bytes: 1024,
            session: SessionConfig::default(),
        }
    }
}

impl LobbyConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Rejects values that would make the server spin or drop every client.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handshake_timeout_ms == 0 {
            return Err(ConfigError::Invalid("handshake_timeout_ms must be > 0"));
        }
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid("idle_timeout_ms must be > 0"));
        }
        if self.max_line_bytes == 0 {
            return Err(ConfigError::Invalid("max_line_bytes must be > 0"));
        }
        if self.housekeeping_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "housekeeping_interval_ms must be > 0",
            ));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_millis(self.housekeeping_interval_ms)
    }

    pub fn accept_backoff(&self) -> Duration {
        Duration::from_millis(self.accept_backoff_ms)
    }
}
