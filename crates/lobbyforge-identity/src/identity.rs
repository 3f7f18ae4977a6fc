//! The [`UserIdentity`] value type and its builder.

use std::fmt;
use std::net::IpAddr;

use crate::IdentityError;

// ---------------------------------------------------------------------------
// UserIdentity
// ---------------------------------------------------------------------------

/// The observable identity of a lobby participant.
///
/// Two identities are equal iff all three facets are equal. `Hash` is
/// derived from the same fields, so `Eq` and `Hash` always agree and the
/// value is safe to use as a key in `HashSet`/`HashMap`.
///
/// Fields are private and there are no setters: once an identity sits in a
/// ban set, nothing can change it out from under the set. "Changing" a
/// facet means deriving a new value with [`with_username`](Self::with_username)
/// or [`with_fingerprint`](Self::with_fingerprint).
///
/// Matching on a single facet (e.g. "same fingerprint, any name") is a
/// policy decision and lives in the session layer's ban list, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentity {
    username: String,
    network_address: IpAddr,
    hashed_fingerprint: String,
}

impl UserIdentity {
    /// Creates an identity from its three facets.
    ///
    /// # Errors
    /// Returns [`IdentityError::InvalidArgument`] if `username` or
    /// `hashed_fingerprint` is empty. No other validation is performed:
    /// name length or address ranges are the caller's concern.
    pub fn new(
        username: impl Into<String>,
        network_address: IpAddr,
        hashed_fingerprint: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let username = require("username", username.into())?;
        let hashed_fingerprint =
            require("hashed fingerprint", hashed_fingerprint.into())?;

        Ok(Self {
            username,
            network_address,
            hashed_fingerprint,
        })
    }

    /// Starts a builder where every facet is optional until
    /// [`build`](UserIdentityBuilder::build).
    pub fn builder() -> UserIdentityBuilder {
        UserIdentityBuilder::default()
    }

    /// The display name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The peer's network address.
    pub fn network_address(&self) -> IpAddr {
        self.network_address
    }

    /// The hashed machine fingerprint.
    pub fn hashed_fingerprint(&self) -> &str {
        &self.hashed_fingerprint
    }

    /// Returns a copy of this identity with a different fingerprint.
    ///
    /// # Errors
    /// Returns [`IdentityError::InvalidArgument`] if `hashed_fingerprint`
    /// is empty.
    pub fn with_fingerprint(
        &self,
        hashed_fingerprint: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        Self::new(
            self.username.clone(),
            self.network_address,
            hashed_fingerprint,
        )
    }

    /// Returns a copy of this identity with a different username.
    ///
    /// # Errors
    /// Returns [`IdentityError::InvalidArgument`] if `username` is empty.
    pub fn with_username(
        &self,
        username: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        Self::new(
            username,
            self.network_address,
            self.hashed_fingerprint.clone(),
        )
    }
}

/// Renders as `username@address`. The fingerprint is left out so it does
/// not end up in logs verbatim.
impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.network_address)
    }
}

fn require(
    facet: &'static str,
    value: String,
) -> Result<String, IdentityError> {
    if value.is_empty() {
        Err(IdentityError::InvalidArgument(facet))
    } else {
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// UserIdentityBuilder
// ---------------------------------------------------------------------------

/// Collects identity facets one at a time, e.g. while a handshake is still
/// being parsed. Any facet that was never supplied makes
/// [`build`](Self::build) fail.
#[derive(Debug, Clone, Default)]
pub struct UserIdentityBuilder {
    username: Option<String>,
    network_address: Option<IpAddr>,
    hashed_fingerprint: Option<String>,
}

impl UserIdentityBuilder {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn network_address(mut self, address: IpAddr) -> Self {
        self.network_address = Some(address);
        self
    }

    pub fn hashed_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.hashed_fingerprint = Some(fingerprint.into());
        self
    }

    /// Builds the identity.
    ///
    /// # Errors
    /// Returns [`IdentityError::InvalidArgument`] naming the first facet
    /// that is absent or empty.
    pub fn build(self) -> Result<UserIdentity, IdentityError> {
        let username = self
            .username
            .ok_or(IdentityError::InvalidArgument("username"))?;
        let network_address = self
            .network_address
            .ok_or(IdentityError::InvalidArgument("network address"))?;
        let hashed_fingerprint = self
            .hashed_fingerprint
            .ok_or(IdentityError::InvalidArgument("hashed fingerprint"))?;

        UserIdentity::new(username, network_address, hashed_fingerprint)
    }
}

// =========================================================================
// Tests
// =========================================================================
