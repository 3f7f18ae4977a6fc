//! Per-connection handler: handshake, admission, and command loop.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `HELLO <username> <machine-id>` or `RESUME <token>`
//!   2. Admit through the session manager → reply `OK <token>` or `ERR ...`
//!   3. Loop: `NAME <new>`, `PING`, `QUIT`
//!
//! Every read runs under the connection's [`InterruptToken`], so a ban or a
//! server shutdown ends the handler at its next wait.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use lobbyforge_identity::{hash_fingerprint, UserIdentity};
use lobbyforge_interrupt::{await_result, InterruptToken, Interruption};
use lobbyforge_session::{Session, SessionError};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::connections::ConnectionId;
use crate::server::ServerState;
use crate::LobbyError;

/// Drop guard that removes the connection from the live registry when the
/// handler exits, panics included.
struct Registration {
    id: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.state.connections.remove(self.id);
    }
}

/// One client command line.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Hello { username: &'a str, machine_id: &'a str },
    Resume { token: &'a str },
    Name(&'a str),
    Ping,
    Quit,
}

impl<'a> Command<'a> {
    /// Parses a line. Keywords are case-insensitive; `None` for anything
    /// unknown or with the wrong number of arguments.
    fn parse(line: &'a str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let keyword = parts.next()?.to_ascii_uppercase();
        let command = match keyword.as_str() {
            "HELLO" => Command::Hello {
                username: parts.next()?,
                machine_id: parts.next()?,
            },
            "RESUME" => Command::Resume {
                token: parts.next()?,
            },
            "NAME" => Command::Name(parts.next()?),
            "PING" => Command::Ping,
            "QUIT" => Command::Quit,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(command)
    }
}

/// What a bounded, interruptible read produced.
enum Inbound {
    Line(String),
    TooLong,
    Closed,
    TimedOut,
    Interrupted,
}

struct LineConn {
    lines: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: OwnedWriteHalf,
}

impl LineConn {
    fn new(stream: TcpStream, max_line_bytes: usize) -> Self {
        let (read, writer) = stream.into_split();
        Self {
            lines: FramedRead::new(read, LinesCodec::new_with_max_length(max_line_bytes)),
            writer,
        }
    }

    async fn next_line(
        &mut self,
        timeout: Duration,
        token: &InterruptToken,
    ) -> Result<Inbound, LobbyError> {
        let lines = &mut self.lines;
        let completion = await_result(token, async move {
            match tokio::time::timeout(timeout, lines.next()).await {
                Ok(Some(Ok(line))) => Ok(Some(Inbound::Line(line))),
                Ok(Some(Err(LinesCodecError::MaxLineLengthExceeded))) => {
                    Ok(Some(Inbound::TooLong))
                }
                Ok(Some(Err(LinesCodecError::Io(e)))) => Err(Interruption::Failed(e)),
                Ok(None) => Ok(Some(Inbound::Closed)),
                Err(_elapsed) => Ok(Some(Inbound::TimedOut)),
            }
        })
        .await?;

        if !completion.is_completed() {
            return Ok(Inbound::Interrupted);
        }
        Ok(completion.into_value().unwrap_or(Inbound::Closed))
    }

    async fn send(&mut self, line: &str) -> Result<(), LobbyError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
    token: InterruptToken,
    state: Arc<ServerState>,
) -> Result<(), LobbyError> {
    let _registration = Registration {
        id,
        state: Arc::clone(&state),
    };
    tracing::debug!(%id, %peer, "handling new connection");

    let mut conn = LineConn::new(stream, state.config.max_line_bytes);

    // --- Step 1: Handshake ---
    let Some(mut identity) = perform_handshake(&mut conn, id, peer, &token, &state).await?
    else {
        return Ok(());
    };

    // --- Step 2: Command loop ---
    let result = command_loop(&mut conn, id, &mut identity, &token, &state).await;

    // The session outlives the socket for the reconnect grace period.
    if let Err(e) = state.sessions.lock().await.disconnect(&identity) {
        tracing::debug!(%id, %identity, error = %e, "disconnect after close failed");
    }
    result
}

/// Reads the first line and admits the client. Returns `None` when the
/// client was refused or went away.
async fn perform_handshake(
    conn: &mut LineConn,
    id: ConnectionId,
    peer: SocketAddr,
    token: &InterruptToken,
    state: &ServerState,
) -> Result<Option<UserIdentity>, LobbyError> {
    let line = match conn.next_line(state.config.handshake_timeout(), token).await? {
        Inbound::Line(line) => line,
        Inbound::Closed | Inbound::Interrupted => return Ok(None),
        Inbound::TooLong => {
            tracing::warn!(%id, %peer, "handshake line too long");
            conn.send("ERR line too long").await?;
            return Ok(None);
        }
        Inbound::TimedOut => {
            tracing::debug!(%id, %peer, "handshake timed out");
            conn.send("ERR handshake timed out").await?;
            return Ok(None);
        }
    };

    // Each arm registers the connection under its identity before the
    // session lock is released, so a concurrent ban always finds it.
    let admitted = match Command::parse(&line) {
        Some(Command::Hello {
            username,
            machine_id,
        }) => {
            let identity = UserIdentity::builder()
                .username(username)
                .network_address(peer.ip())
                .hashed_fingerprint(hash_fingerprint(machine_id))
                .build()
                .map_err(SessionError::Identity);
            let mut sessions = state.sessions.lock().await;
            let admitted =
                identity.and_then(|identity| sessions.create(identity).map(admission));
            register(state, id, &admitted);
            admitted
        }
        Some(Command::Resume { token: resume }) => {
            let mut sessions = state.sessions.lock().await;
            let same_address = sessions
                .identity_for_token(resume)
                .is_some_and(|identity| identity.network_address() == peer.ip());
            let admitted = if same_address {
                sessions.reconnect(resume).map(admission)
            } else {
                Err(SessionError::InvalidToken)
            };
            register(state, id, &admitted);
            admitted
        }
        _ => {
            conn.send("ERR expected HELLO or RESUME").await?;
            return Ok(None);
        }
    };

    match admitted {
        Ok((identity, reconnect_token)) => {
            conn.send(&format!("OK {reconnect_token}")).await?;
            tracing::info!(%id, %identity, "client admitted");
            Ok(Some(identity))
        }
        Err(e) => {
            tracing::warn!(%id, %peer, error = %e, "client refused");
            conn.send(&format!("ERR {e}")).await?;
            Ok(None)
        }
    }
}

fn admission(session: &Session) -> (UserIdentity, String) {
    (session.identity.clone(), session.reconnect_token.clone())
}

/// Records the admitted identity in the live registry. Call with the
/// session lock held.
fn register(
    state: &ServerState,
    id: ConnectionId,
    admitted: &Result<(UserIdentity, String), SessionError>,
) {
    if let Ok((identity, _)) = admitted {
        state.connections.set_identity(id, identity.clone());
    }
}

async fn command_loop(
    conn: &mut LineConn,
    id: ConnectionId,
    identity: &mut UserIdentity,
    token: &InterruptToken,
    state: &ServerState,
) -> Result<(), LobbyError> {
    loop {
        let line = match conn.next_line(state.config.idle_timeout(), token).await? {
            Inbound::Line(line) => line,
            Inbound::Closed => {
                tracing::info!(%id, %identity, "connection closed cleanly");
                return Ok(());
            }
            Inbound::TooLong => {
                tracing::warn!(%id, %identity, "line too long, dropping");
                conn.send("ERR line too long").await?;
                return Ok(());
            }
            Inbound::TimedOut => {
                tracing::info!(%id, %identity, "connection idle, dropping");
                conn.send("ERR idle timeout").await?;
                return Ok(());
            }
            Inbound::Interrupted => {
                tracing::info!(%id, %identity, "connection interrupted");
                return Ok(());
            }
        };

        match Command::parse(&line) {
            Some(Command::Ping) => conn.send("PONG").await?,
            Some(Command::Name(new_username)) => {
                // Re-registered under the session lock, as in the handshake.
                let renamed = {
                    let mut sessions = state.sessions.lock().await;
                    let renamed = sessions
                        .rename(identity, new_username)
                        .map(|session| session.identity.clone());
                    if let Ok(renamed) = &renamed {
                        state.connections.set_identity(id, renamed.clone());
                    }
                    renamed
                };
                match renamed {
                    Ok(renamed) => {
                        tracing::info!(%id, from = %identity, to = %renamed, "renamed");
                        *identity = renamed;
                        conn.send(&format!("OK {}", identity.username())).await?;
                    }
                    Err(e) => conn.send(&format!("ERR {e}")).await?,
                }
            }
            Some(Command::Quit) => {
                conn.send("BYE").await?;
                return Ok(());
            }
            _ => conn.send("ERR unknown command").await?,
        }
    }
}
