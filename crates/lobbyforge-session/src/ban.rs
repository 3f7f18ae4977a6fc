//! Ban storage and matching policy.
//!
//! Bans are stored as full [`UserIdentity`] values, so storage relies only
//! on the identity's exact `Eq`/`Hash`. Looser matching ("anyone from this
//! machine") is layered on top by comparing single facets, one at a time,
//! according to a [`BanPolicy`].

use std::collections::HashSet;
use std::fmt;

use lobbyforge_identity::UserIdentity;
use serde::{Deserialize, Serialize};

/// Which facets of a stored ban are enough to refuse an identity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BanPolicy {
    /// Only the exact (username, address, fingerprint) triple.
    Exact,
    /// Same username, any address or machine.
    Username,
    /// Same network address.
    Address,
    /// Same hashed machine fingerprint, whatever name or address is used.
    Fingerprint,
    /// Any single facet matching is enough.
    #[default]
    Any,
}

/// The facet that caused a match, reported back to the caller for logging
/// and for the rejection message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BanFacet {
    Exact,
    Username,
    Address,
    Fingerprint,
}

impl fmt::Display for BanFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BanFacet::Exact => "identity",
            BanFacet::Username => "username",
            BanFacet::Address => "address",
            BanFacet::Fingerprint => "fingerprint",
        };
        f.write_str(name)
    }
}

/// A set of banned identities.
#[derive(Debug, Clone, Default)]
pub struct BanList {
    entries: HashSet<UserIdentity>,
}

impl BanList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a ban. Returns `false` if this exact identity was already banned.
    pub fn insert(&mut self, identity: UserIdentity) -> bool {
        self.entries.insert(identity)
    }

    /// Lifts a ban on this exact identity. Returns `false` if there was none.
    pub fn remove(&mut self, identity: &UserIdentity) -> bool {
        self.entries.remove(identity)
    }

    /// Whether this exact identity is banned.
    pub fn contains_exact(&self, identity: &UserIdentity) -> bool {
        self.entries.contains(identity)
    }

    /// Returns the facet on which `identity` matches a ban under `policy`,
    /// or `None` if it is allowed in.
    ///
    /// Under [`BanPolicy::Any`] facets are tried in order: exact, username,
    /// address, fingerprint.
    pub fn matching_facet(
        &self,
        identity: &UserIdentity,
        policy: BanPolicy,
    ) -> Option<BanFacet> {
        let facets: &[BanFacet] = match policy {
            BanPolicy::Exact => &[BanFacet::Exact],
            BanPolicy::Username => &[BanFacet::Username],
            BanPolicy::Address => &[BanFacet::Address],
            BanPolicy::Fingerprint => &[BanFacet::Fingerprint],
            BanPolicy::Any => &[
                BanFacet::Exact,
                BanFacet::Username,
                BanFacet::Address,
                BanFacet::Fingerprint,
            ],
        };

        facets
            .iter()
            .copied()
            .find(|facet| self.matches_facet(identity, *facet))
    }

    /// Whether `identity` is refused under `policy`.
    pub fn matches(&self, identity: &UserIdentity, policy: BanPolicy) -> bool {
        self.matching_facet(identity, policy).is_some()
    }

    fn matches_facet(&self, identity: &UserIdentity, facet: BanFacet) -> bool {
        match facet {
            BanFacet::Exact => self.entries.contains(identity),
            BanFacet::Username => self
                .entries
                .iter()
                .any(|b| b.username() == identity.username()),
            BanFacet::Address => self
                .entries
                .iter()
                .any(|b| b.network_address() == identity.network_address()),
            BanFacet::Fingerprint => self
                .entries
                .iter()
                .any(|b| b.hashed_fingerprint() == identity.hashed_fingerprint()),
        }
    }

    /// Iterates over the stored bans in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &UserIdentity> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
