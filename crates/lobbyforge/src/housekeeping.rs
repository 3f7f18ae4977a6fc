//! Periodic session housekeeping.

use std::sync::Arc;
use std::time::Duration;

use lobbyforge_interrupt::{sleep_for, InterruptToken};
use lobbyforge_session::SessionManager;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Expires and removes stale sessions every `interval` until `token` is
/// interrupted. Returns the total number of sessions expired.
///
/// The loop only ever stops at its sleep, so an interrupt never lands in
/// the middle of a sweep.
pub async fn run_housekeeping(
    sessions: Arc<Mutex<SessionManager>>,
    interval: Duration,
    token: InterruptToken,
) -> usize {
    debug!(?interval, "housekeeping started");
    let mut total = 0;

    while sleep_for(&token, interval).await {
        let mut sessions = sessions.lock().await;
        let expired = sessions.expire_stale();
        sessions.cleanup_expired();

        if !expired.is_empty() {
            info!(count = expired.len(), remaining = sessions.len(), "stale sessions removed");
        }
        total += expired.len();
    }

    debug!(total, "housekeeping stopped");
    total
}
