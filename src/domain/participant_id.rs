//! Type-safe participant identifier.
//!
//! [`ParticipantId`] is a newtype wrapper around `u64` so that participant
//! identities cannot be confused with other integers (wire tags, queue
//! capacities, counts).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a connected participant.
///
/// Assigned by the registry at registration time, starting at `1` and
/// strictly increasing for the lifetime of the registry. Identities are
/// never reused. `0` is never assigned and is what a wire envelope carries
/// when the client omits the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(u64);

impl ParticipantId {
    /// The first identity handed out by a fresh registry.
    pub const FIRST: Self = Self(1);

    /// Creates a `ParticipantId` from a raw integer.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the identity that follows this one.
    ///
    /// Saturates at `u64::MAX`; a process would need to accept more than
    /// 18 quintillion connections to get there.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<ParticipantId> for u64 {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}
