//! Per-task interruption status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// The interrupted status of one execution context (usually one task).
///
/// Cloning is cheap and every clone observes the same flag: the task keeps
/// one clone to wait on, and whoever may stop it (the server's shutdown
/// path) keeps another to call [`interrupt`](Self::interrupt).
///
/// Unlike a one-shot cancellation token, the flag can be cleared again with
/// [`clear`](Self::clear), which lets a lower layer consume the signal and
/// hand it back up (see [`await_result`](crate::await_result)).
#[derive(Debug, Clone, Default)]
pub struct InterruptToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

impl InterruptToken {
    /// Creates a token whose flag is clear.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag and wakes every task waiting in
    /// [`interrupted`](Self::interrupted). Idempotent.
    pub fn interrupt(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether the flag is currently raised. Does not clear it.
    pub fn is_interrupted(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Clears the flag and returns whether it was raised.
    pub fn clear(&self) -> bool {
        self.inner.flag.swap(false, Ordering::SeqCst)
    }

    /// Resolves once the flag is raised; immediately if it already is.
    ///
    /// Waiting never clears the flag. Cancel-safe: dropping the future
    /// simply stops waiting.
    pub async fn interrupted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so an `interrupt()` that
            // lands between the check and the await is not missed.
            notified.as_mut().enable();

            if self.is_interrupted() {
                return;
            }
            notified.await;
        }
    }
}
