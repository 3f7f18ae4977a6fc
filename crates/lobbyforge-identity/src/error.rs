//! Error types for the identity layer.

/// Errors raised while constructing or deriving a [`UserIdentity`](crate::UserIdentity).
///
/// These are always caller defects (missing input), so they are never
/// retried. The payload names the facet that was missing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// A required facet was absent or empty.
    #[error("invalid argument: {0} is required")]
    InvalidArgument(&'static str),
}
