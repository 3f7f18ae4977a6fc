//! Result and signal types for interruptible operations.

// ---------------------------------------------------------------------------
// Interruption: what an operation may fail with
// ---------------------------------------------------------------------------

/// How an interruptible operation can end without producing a value.
///
/// An operation passed to [`await_result`](crate::await_result) resolves to
/// `Result<Option<T>, Interruption<E>>`. `Interrupted` is the one outcome
/// the framework converts into data; `Failed` carries any other error and
/// is handed back to the caller untouched.
///
/// `From<E>` is implemented, so inside an operation `?` on a
/// `Result<_, E>` lands in `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum Interruption<E> {
    /// The task was interrupted while the operation was waiting.
    #[error("interrupted while waiting")]
    Interrupted,

    /// The operation failed for a reason unrelated to interruption.
    #[error(transparent)]
    Failed(E),
}

impl<E> From<E> for Interruption<E> {
    fn from(err: E) -> Self {
        Self::Failed(err)
    }
}

// ---------------------------------------------------------------------------
// Completion: what the caller gets back
// ---------------------------------------------------------------------------

/// The normalized outcome of an interruptible wait.
///
/// Fields are private so the invariant holds by construction: an
/// interrupted completion never carries a value, whatever the operation
/// produced before it was stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a Completion reports whether the wait was interrupted"]
pub struct Completion<T> {
    completed: bool,
    value: Option<T>,
}

impl<T> Completion<T> {
    /// The operation finished. `None` means it produced no value, which is
    /// a normal outcome, not an error.
    pub fn done(value: Option<T>) -> Self {
        Self {
            completed: true,
            value,
        }
    }

    /// The operation was interrupted. Always empty.
    pub fn interrupted() -> Self {
        Self {
            completed: false,
            value: None,
        }
    }

    /// `true` iff the operation finished without interruption.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// The produced value, if the operation completed with one.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Consumes the completion, returning the produced value.
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}
