//! Interruptible waits for Lobbyforge.
//!
//! Every blocking wait in the lobby (accepting a socket, reading with a
//! timeout, sleeping before a retry, a remote "test post") may need to stop
//! early because its task was asked to, usually because the server is
//! shutting down. This crate turns "a wait that may be interrupted" into
//! data the caller inspects:
//!
//! - [`await_result`] runs an operation and returns a [`Completion`]
//!   (`completed` + optional value) instead of raising interruption.
//! - [`await_completion`] is the same for operations without a value.
//! - [`sleep`] / [`sleep_nanos`] / [`sleep_for`] suspend the task and report
//!   whether the full duration elapsed.
//!
//! # Interruption status
//!
//! Each task carries an [`InterruptToken`]. When a wait ends because of
//! interruption, the token's flag is left **set**, even if the operation
//! itself consumed it with [`InterruptToken::clear`]. A caller that sees
//! `completed == false` can therefore check `token.is_interrupted()` and
//! get a truthful answer, and nested waits on the same token stop too.
//!
//! Only interruption is converted. Any other failure from the operation
//! ([`Interruption::Failed`]) is returned to the caller unchanged.
//!
//! ```text
//! shutdown ──interrupt()──→ InterruptToken ──→ await_result(...) ──→ Completion { completed: false }
//!                                                   │
//!                                      op error ────┴──→ Err(e)  (passed through)
//! ```

mod completion;
mod error;
mod ops;
mod token;

pub use completion::{Completion, Interruption};
pub use error::InterruptError;
pub use ops::{
    await_completion, await_result, sleep, sleep_for, sleep_nanos,
    MAX_EXTRA_NANOS,
};
pub use token::InterruptToken;
