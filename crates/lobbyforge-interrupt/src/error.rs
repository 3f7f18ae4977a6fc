//! Error types for the interrupt layer.

/// Errors raised synchronously by the interrupt layer's own entry points.
///
/// Interruption is deliberately absent: it is reported through
/// [`Completion`](crate::Completion), never as an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterruptError {
    /// A duration argument was out of range (negative milliseconds, or
    /// extra nanoseconds outside `0..=999_999`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
