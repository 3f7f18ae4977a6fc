//! Registry of live connection tasks and their interrupt tokens.
//!
//! The registry is how the server reaches into a running handler: shutdown
//! interrupts every entry, and a ban interrupts the entries whose identity
//! was kicked. The handler notices at its next wait and exits cleanly.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lobbyforge_identity::UserIdentity;
use lobbyforge_interrupt::InterruptToken;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct Entry {
    identity: Option<UserIdentity>,
    token: InterruptToken,
}

/// Live connections. A plain `std` mutex: every critical section is a few
/// map operations and it must be usable from `Drop`.
#[derive(Default)]
pub(crate) struct Connections {
    entries: Mutex<HashMap<ConnectionId, Entry>>,
}

impl Connections {
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, id: ConnectionId, token: InterruptToken) {
        self.lock().insert(
            id,
            Entry {
                identity: None,
                token,
            },
        );
    }

    /// Records which identity a connection is logged in as. Called after the
    /// handshake and again after every re-identification.
    pub(crate) fn set_identity(&self, id: ConnectionId, identity: UserIdentity) {
        if let Some(entry) = self.lock().get_mut(&id) {
            entry.identity = Some(identity);
        }
    }

    pub(crate) fn remove(&self, id: ConnectionId) {
        self.lock().remove(&id);
    }

    /// Interrupts every connection logged in as one of `identities`.
    /// Returns how many were interrupted.
    pub(crate) fn interrupt_identities(&self, identities: &[UserIdentity]) -> usize {
        let entries = self.lock();
        let mut count = 0;
        for entry in entries.values() {
            let kicked = entry
                .identity
                .as_ref()
                .is_some_and(|identity| identities.contains(identity));
            if kicked {
                entry.token.interrupt();
                count += 1;
            }
        }
        count
    }

    pub(crate) fn interrupt_all(&self) {
        for entry in self.lock().values() {
            entry.token.interrupt();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}
