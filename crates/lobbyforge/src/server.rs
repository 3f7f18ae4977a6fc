//! `LobbyServer` builder, accept loop, and control handle.
//!
//! This is the entry point for running a lobby. It ties together the
//! layers: TCP listener → line handler → session manager, with every
//! blocking wait running under an [`InterruptToken`] so that shutdown is
//! observed as data instead of tearing through the stack.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use lobbyforge_identity::UserIdentity;
use lobbyforge_interrupt::{await_result, sleep_for, InterruptToken, Interruption};
use lobbyforge_session::{Session, SessionConfig, SessionManager};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::connections::{ConnectionId, Connections};
use crate::handler::handle_connection;
use crate::housekeeping::run_housekeeping;
use crate::{LobbyConfig, LobbyError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) sessions: Arc<Mutex<SessionManager>>,
    pub(crate) connections: Connections,
    pub(crate) config: LobbyConfig,
    pub(crate) shutdown: CancellationToken,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a lobby server.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), lobbyforge::LobbyError> {
/// use lobbyforge::LobbyServer;
///
/// let server = LobbyServer::builder().bind("0.0.0.0:3304").build().await?;
/// let handle = server.handle();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     handle.shutdown();
/// });
/// server.run().await
/// # }
/// ```
pub struct LobbyServerBuilder {
    config: LobbyConfig,
}

impl LobbyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: LobbyConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: LobbyConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Validates the configuration and binds the listener.
    pub async fn build(self) -> Result<LobbyServer, LobbyError> {
        self.config.validate()?;

        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "lobby listening");

        let state = Arc::new(ServerState {
            sessions: Arc::new(Mutex::new(SessionManager::new(
                self.config.session.clone(),
            ))),
            connections: Connections::default(),
            config: self.config,
            shutdown: CancellationToken::new(),
        });

        Ok(LobbyServer {
            listener,
            state,
            accept_token: InterruptToken::new(),
        })
    }
}

impl Default for LobbyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A bound lobby server. Call [`run`](Self::run) to start accepting.
pub struct LobbyServer {
    listener: TcpListener,
    state: Arc<ServerState>,
    accept_token: InterruptToken,
}

impl LobbyServer {
    /// Creates a new builder.
    pub fn builder() -> LobbyServerBuilder {
        LobbyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A cloneable handle for shutdown and moderation while `run` is
    /// in progress.
    pub fn handle(&self) -> LobbyHandle {
        LobbyHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the accept loop until [`LobbyHandle::shutdown`] is called.
    ///
    /// Returns once every connection handler and the housekeeping task
    /// have finished.
    pub async fn run(self) -> Result<(), LobbyError> {
        let tracker = TaskTracker::new();

        let housekeeping_token = InterruptToken::new();
        tracker.spawn(run_housekeeping(
            Arc::clone(&self.state.sessions),
            self.state.config.housekeeping_interval(),
            housekeeping_token.clone(),
        ));
        tracker.spawn(forward_shutdown(
            Arc::clone(&self.state),
            vec![self.accept_token.clone(), housekeeping_token],
        ));

        tracing::info!("lobby server running");

        loop {
            let accepted = await_result(&self.accept_token, async {
                let (stream, peer) = self.listener.accept().await?;
                Ok::<_, Interruption<io::Error>>(Some((stream, peer)))
            })
            .await;

            match accepted {
                Ok(completion) if !completion.is_completed() => {
                    tracing::debug!("accept loop interrupted");
                    break;
                }
                Ok(completion) => {
                    if let Some((stream, peer)) = completion.into_value() {
                        self.spawn_connection(&tracker, stream, peer);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    if !sleep_for(&self.accept_token, self.state.config.accept_backoff())
                        .await
                    {
                        break;
                    }
                }
            }
        }

        // Make sure the forwarder and every handler see the shutdown even if
        // the loop ended on its own.
        self.state.shutdown.cancel();
        tracker.close();
        tracker.wait().await;

        tracing::info!("lobby server stopped");
        Ok(())
    }

    fn spawn_connection(
        &self,
        tracker: &TaskTracker,
        stream: TcpStream,
        peer: SocketAddr,
    ) {
        let id = ConnectionId::next();
        let token = InterruptToken::new();
        self.state.connections.register(id, token.clone());
        // Accepted after shutdown began: the forwarder may already have run.
        if self.state.shutdown.is_cancelled() {
            token.interrupt();
        }

        let state = Arc::clone(&self.state);
        tracker.spawn(async move {
            if let Err(e) = handle_connection(id, stream, peer, token, state).await {
                tracing::debug!(%id, error = %e, "connection ended with error");
            }
        });
    }
}

/// Waits for shutdown, then interrupts the server's own waits and every
/// live connection.
async fn forward_shutdown(state: Arc<ServerState>, tokens: Vec<InterruptToken>) {
    state.shutdown.cancelled().await;
    tracing::info!(
        connections = state.connections.len(),
        "shutdown requested, interrupting waits"
    );
    for token in &tokens {
        token.interrupt();
    }
    state.connections.interrupt_all();
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Control handle for a running [`LobbyServer`].
#[derive(Clone)]
pub struct LobbyHandle {
    state: Arc<ServerState>,
}

impl LobbyHandle {
    /// Asks the server to stop. Idempotent.
    pub fn shutdown(&self) {
        self.state.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.shutdown.is_cancelled()
    }

    /// Bans `identity` and drops every live connection whose session the
    /// ban closed. Returns how many connections were interrupted.
    pub async fn ban(&self, identity: UserIdentity) -> usize {
        let kicked = self.state.sessions.lock().await.ban(identity);
        self.state.connections.interrupt_identities(&kicked)
    }

    /// Lifts a ban on this exact identity.
    pub async fn unban(&self, identity: &UserIdentity) -> bool {
        self.state.sessions.lock().await.unban(identity)
    }

    /// A snapshot of the session stored for `identity`.
    pub async fn session(&self, identity: &UserIdentity) -> Option<Session> {
        self.state.sessions.lock().await.get(identity).cloned()
    }

    /// Number of sessions in any state.
    pub async fn session_count(&self) -> usize {
        self.state.sessions.lock().await.len()
    }

    /// Number of live connection handlers.
    pub fn connection_count(&self) -> usize {
        self.state.connections.len()
    }
}
