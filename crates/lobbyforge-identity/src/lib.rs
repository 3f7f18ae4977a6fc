//! User identity for the Lobbyforge lobby server.
//!
//! A lobby participant is observed through three independent facets:
//!
//! 1. **Username**: the display name they logged in with
//! 2. **Network address**: the IP their connection came from
//! 3. **Hashed fingerprint**: a one-way hash of a machine identifier
//!
//! [`UserIdentity`] bundles those facets into an immutable value with
//! structural equality, so it can be used directly as a `HashSet`/`HashMap`
//! key for ban lists and active-session lookups.
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby server (above)  ← builds one identity per connection attempt
//!     ↕
//! Session Layer         ← keys sessions and bans by identity
//!     ↕
//! Identity (this crate) ← value type, no dependencies on other layers
//! ```

mod error;
mod fingerprint;
mod identity;

pub use error::IdentityError;
pub use fingerprint::hash_fingerprint;
pub use identity::{UserIdentity, UserIdentityBuilder};
