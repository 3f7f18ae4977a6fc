//! Integration tests for the lobby server, handler, and full connection flow.

use std::net::SocketAddr;
use std::time::Duration;

use lobbyforge::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

// =========================================================================
// Helpers
// =========================================================================

const WAIT: Duration = Duration::from_secs(5);

fn test_config() -> LobbyConfig {
    LobbyConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        // Keep expired sessions around long enough to inspect them.
        housekeeping_interval_ms: 60_000,
        ..LobbyConfig::default()
    }
}

async fn start(
    config: LobbyConfig,
) -> (SocketAddr, LobbyHandle, JoinHandle<Result<(), LobbyError>>) {
    let server = LobbyServer::builder().config(config).build().await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.handle();
    let task = tokio::spawn(server.run());
    (addr, handle, task)
}

/// Bans `identity` as soon as its session becomes visible.
async fn ban_on_sight(handle: LobbyHandle, identity: UserIdentity) -> usize {
    loop {
        if handle.session(&identity).await.is_some() {
            return handle.ban(identity).await;
        }
        tokio::task::yield_now().await;
    }
}

fn local(name: &str, machine_id: &str) -> UserIdentity {
    UserIdentity::new(name, "127.0.0.1".parse().unwrap(), hash_fingerprint(machine_id))
        .unwrap()
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let (read, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    /// Connects and completes `HELLO`, returning the client and its token.
    async fn hello(addr: SocketAddr, username: &str, machine_id: &str) -> (Self, String) {
        let mut client = Self::connect(addr).await;
        client.send(&format!("HELLO {username} {machine_id}")).await;
        let reply = client.recv().await.expect("reply");
        let token = reply.strip_prefix("OK ").expect("admitted").to_string();
        (client, token)
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    /// Next line, or `None` once the server closes the socket.
    async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .expect("server reply timed out")
            .unwrap_or(None)
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_hello_returns_ok_with_reconnect_token() {
    let (addr, handle, _task) = start(test_config()).await;

    let (_client, token) = Client::hello(addr, "alice", "machine-1").await;

    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    let session = handle.session(&local("alice", "machine-1")).await.unwrap();
    assert_eq!(session.reconnect_token, token);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_hello_missing_machine_id_is_refused() {
    let (addr, _handle, _task) = start(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.send("HELLO alice").await;

    assert_eq!(client.recv().await.as_deref(), Some("ERR expected HELLO or RESUME"));
    assert_eq!(client.recv().await, None);
}

#[tokio::test]
async fn test_hello_duplicate_identity_is_refused() {
    let (addr, _handle, _task) = start(test_config()).await;
    let (_first, _) = Client::hello(addr, "alice", "machine-1").await;
    let mut second = Client::connect(addr).await;

    second.send("HELLO alice machine-1").await;

    let reply = second.recv().await.unwrap();
    assert!(reply.starts_with("ERR "), "got {reply}");
    assert!(reply.contains("already has an active session"), "got {reply}");
}

#[tokio::test]
async fn test_silent_client_gets_handshake_timeout() {
    let config = LobbyConfig {
        handshake_timeout_ms: 50,
        ..test_config()
    };
    let (addr, _handle, _task) = start(config).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.recv().await.as_deref(), Some("ERR handshake timed out"));
    assert_eq!(client.recv().await, None);
}

#[tokio::test]
async fn test_overlong_hello_is_refused_without_session() {
    let config = LobbyConfig {
        max_line_bytes: 64,
        ..test_config()
    };
    let (addr, handle, _task) = start(config).await;
    let mut client = Client::connect(addr).await;

    client.send(&format!("HELLO {} machine-1", "a".repeat(200))).await;

    assert_eq!(client.recv().await.as_deref(), Some("ERR line too long"));
    assert_eq!(client.recv().await, None);
    assert_eq!(handle.session_count().await, 0);
}

// =========================================================================
// Commands
// =========================================================================

#[tokio::test]
async fn test_ping_replies_pong() {
    let (addr, _handle, _task) = start(test_config()).await;
    let (mut client, _) = Client::hello(addr, "alice", "machine-1").await;

    client.send("PING").await;

    assert_eq!(client.recv().await.as_deref(), Some("PONG"));
}

#[tokio::test]
async fn test_unknown_command_keeps_connection_open() {
    let (addr, _handle, _task) = start(test_config()).await;
    let (mut client, _) = Client::hello(addr, "alice", "machine-1").await;

    client.send("DANCE").await;
    assert_eq!(client.recv().await.as_deref(), Some("ERR unknown command"));

    client.send("PING").await;
    assert_eq!(client.recv().await.as_deref(), Some("PONG"));
}

#[tokio::test]
async fn test_name_rekeys_session() {
    let (addr, handle, _task) = start(test_config()).await;
    let (mut client, token) = Client::hello(addr, "alice", "machine-1").await;

    client.send("NAME alicia").await;

    assert_eq!(client.recv().await.as_deref(), Some("OK alicia"));
    assert!(handle.session(&local("alice", "machine-1")).await.is_none());
    let renamed = handle.session(&local("alicia", "machine-1")).await.unwrap();
    assert_eq!(renamed.reconnect_token, token);
}

#[tokio::test]
async fn test_overlong_command_closes_connection() {
    let config = LobbyConfig {
        max_line_bytes: 64,
        ..test_config()
    };
    let (addr, handle, _task) = start(config).await;
    let (mut client, _) = Client::hello(addr, "alice", "machine-1").await;

    client.send(&format!("NAME {}", "b".repeat(200))).await;

    assert_eq!(client.recv().await.as_deref(), Some("ERR line too long"));
    assert_eq!(client.recv().await, None);
    let session = handle.session(&local("alice", "machine-1")).await.unwrap();
    assert!(matches!(session.state, SessionState::Disconnected { .. }));
}

#[tokio::test]
async fn test_quit_says_bye_and_leaves_session_disconnected() {
    let (addr, handle, _task) = start(test_config()).await;
    let (mut client, _) = Client::hello(addr, "alice", "machine-1").await;

    client.send("QUIT").await;

    assert_eq!(client.recv().await.as_deref(), Some("BYE"));
    assert_eq!(client.recv().await, None);
    let session = handle.session(&local("alice", "machine-1")).await.unwrap();
    assert!(matches!(session.state, SessionState::Disconnected { .. }));
}

#[tokio::test]
async fn test_resume_after_quit_restores_session() {
    let (addr, handle, _task) = start(test_config()).await;
    let (mut client, token) = Client::hello(addr, "alice", "machine-1").await;
    client.send("QUIT").await;
    assert_eq!(client.recv().await.as_deref(), Some("BYE"));
    assert_eq!(client.recv().await, None);

    let mut again = Client::connect(addr).await;
    again.send(&format!("RESUME {token}")).await;

    assert_eq!(again.recv().await, Some(format!("OK {token}")));
    let session = handle.session(&local("alice", "machine-1")).await.unwrap();
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_resume_unknown_token_is_refused() {
    let (addr, _handle, _task) = start(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.send("RESUME 00000000000000000000000000000000").await;

    assert_eq!(
        client.recv().await.as_deref(),
        Some("ERR invalid reconnection token")
    );
}

// =========================================================================
// Bans
// =========================================================================

#[tokio::test]
async fn test_fingerprint_ban_refuses_other_name_from_same_machine() {
    let mut config = test_config();
    config.session.ban_policy = BanPolicy::Fingerprint;
    let (addr, handle, _task) = start(config).await;
    handle.ban(local("mallory", "machine-1")).await;
    let mut client = Client::connect(addr).await;

    client.send("HELLO alice machine-1").await;

    let reply = client.recv().await.unwrap();
    assert!(reply.starts_with("ERR "), "got {reply}");
    assert!(reply.contains("banned"), "got {reply}");
}

#[tokio::test]
async fn test_fingerprint_ban_admits_other_machine() {
    let mut config = test_config();
    config.session.ban_policy = BanPolicy::Fingerprint;
    let (addr, handle, _task) = start(config).await;
    handle.ban(local("mallory", "machine-1")).await;

    let (_client, token) = Client::hello(addr, "alice", "machine-2").await;

    assert_eq!(token.len(), 32);
}

#[tokio::test]
async fn test_ban_kicks_connected_client() {
    let (addr, handle, _task) = start(test_config()).await;
    let (mut client, _) = Client::hello(addr, "alice", "machine-1").await;

    let kicked = handle.ban(local("alice", "machine-1")).await;

    assert_eq!(kicked, 1);
    assert_eq!(client.recv().await, None);
    let session = handle.session(&local("alice", "machine-1")).await.unwrap();
    assert!(matches!(session.state, SessionState::Expired));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ban_racing_admission_still_kicks() {
    let (addr, handle, _task) = start(test_config()).await;
    let ban = tokio::spawn(ban_on_sight(handle.clone(), local("alice", "machine-1")));
    let mut client = Client::connect(addr).await;

    client.send("HELLO alice machine-1").await;

    let kicked = tokio::time::timeout(WAIT, ban).await.unwrap().unwrap();
    assert_eq!(kicked, 1);
    let reply = client.recv().await.unwrap();
    assert!(reply.starts_with("OK "), "got {reply}");
    assert_eq!(client.recv().await, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ban_racing_rename_still_kicks() {
    let (addr, handle, _task) = start(test_config()).await;
    let (mut client, _) = Client::hello(addr, "alice", "machine-1").await;
    let ban = tokio::spawn(ban_on_sight(handle.clone(), local("alicia", "machine-1")));

    client.send("NAME alicia").await;

    let kicked = tokio::time::timeout(WAIT, ban).await.unwrap().unwrap();
    assert_eq!(kicked, 1);
    assert_eq!(client.recv().await.as_deref(), Some("OK alicia"));
    assert_eq!(client.recv().await, None);
}

#[tokio::test]
async fn test_unban_lets_identity_back_in() {
    let (addr, handle, _task) = start(test_config()).await;
    handle.ban(local("alice", "machine-1")).await;
    assert!(handle.unban(&local("alice", "machine-1")).await);

    let (_client, token) = Client::hello(addr, "alice", "machine-1").await;

    assert_eq!(token.len(), 32);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_closes_clients_and_run_returns() {
    let (addr, handle, task) = start(test_config()).await;
    let (mut client, _) = Client::hello(addr, "alice", "machine-1").await;

    handle.shutdown();

    assert_eq!(client.recv().await, None);
    let result = tokio::time::timeout(WAIT, task).await.expect("run returned");
    assert!(result.unwrap().is_ok());
    assert!(handle.is_shutting_down());
    assert_eq!(handle.connection_count(), 0);
}

#[tokio::test]
async fn test_shutdown_with_no_clients_returns_promptly() {
    let (_addr, handle, task) = start(test_config()).await;

    handle.shutdown();

    let result = tokio::time::timeout(WAIT, task).await.expect("run returned");
    assert!(result.unwrap().is_ok());
}

#[tokio::test]
async fn test_build_rejects_invalid_config() {
    let config = LobbyConfig {
        idle_timeout_ms: 0,
        ..test_config()
    };

    let result = LobbyServer::builder().config(config).build().await;

    assert!(matches!(result, Err(LobbyError::Config(_))));
}
