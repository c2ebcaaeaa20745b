//! Control messages exchanged between peers.
//!
//! [`SignalMessage`] is a closed sum type over the five message kinds the
//! relay understands. Each variant carries only the fields its routing rule
//! needs: fan-out kinds have no receiver, unicast kinds always have one.
//! Converting from and to the integer-tagged wire envelope happens in
//! [`crate::ws::messages`].

use std::fmt;

use serde_json::Value;

use super::ParticipantId;

static NULL_DATA: Value = Value::Null;

/// Discriminator for [`SignalMessage`], mirroring the wire `typ` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A new participant joined.
    Welcome,
    /// Session description offer.
    Offer,
    /// Session description answer.
    Answer,
    /// ICE candidate.
    CandidateExchange,
    /// A participant is leaving the session.
    Leave,
}

impl MessageKind {
    /// Returns the integer tag used on the wire.
    #[must_use]
    pub const fn wire_tag(self) -> i64 {
        match self {
            Self::Welcome => 0,
            Self::Offer => 1,
            Self::Answer => 2,
            Self::CandidateExchange => 3,
            Self::Leave => 4,
        }
    }

    /// Maps a wire tag back to a kind, or `None` for an unknown tag.
    #[must_use]
    pub const fn from_wire_tag(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(Self::Welcome),
            1 => Some(Self::Offer),
            2 => Some(Self::Answer),
            3 => Some(Self::CandidateExchange),
            4 => Some(Self::Leave),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Welcome => "welcome",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::CandidateExchange => "candidate_exchange",
            Self::Leave => "leave",
        };
        f.write_str(name)
    }
}

/// Payload of a message addressed to exactly one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Directed {
    /// Originating participant.
    pub sender_id: ParticipantId,
    /// Intended recipient.
    pub receiver_id: ParticipantId,
    /// Opaque application data (session description or ICE candidate).
    pub data: Value,
}

/// A control message routed by the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalMessage {
    /// Announces `sender_id` to every other participant.
    Welcome {
        /// The participant that joined.
        sender_id: ParticipantId,
    },
    /// Session description offer, unicast.
    Offer(Directed),
    /// Session description answer, unicast.
    Answer(Directed),
    /// ICE candidate, unicast.
    CandidateExchange(Directed),
    /// Announces that `sender_id` is leaving, fanned out.
    Leave {
        /// The participant that is leaving.
        sender_id: ParticipantId,
        /// Opaque application data, passed through untouched.
        data: Value,
    },
}

/// How a message is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Every participant except the originator.
    FanOut,
    /// Only the named participant.
    Unicast(ParticipantId),
}

impl SignalMessage {
    /// Returns the kind of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Welcome { .. } => MessageKind::Welcome,
            Self::Offer(_) => MessageKind::Offer,
            Self::Answer(_) => MessageKind::Answer,
            Self::CandidateExchange(_) => MessageKind::CandidateExchange,
            Self::Leave { .. } => MessageKind::Leave,
        }
    }

    /// Returns the originating participant.
    #[must_use]
    pub const fn sender_id(&self) -> ParticipantId {
        match self {
            Self::Welcome { sender_id } | Self::Leave { sender_id, .. } => *sender_id,
            Self::Offer(d) | Self::Answer(d) | Self::CandidateExchange(d) => d.sender_id,
        }
    }

    /// Returns the routing rule for this message.
    #[must_use]
    pub const fn delivery(&self) -> Delivery {
        match self {
            Self::Welcome { .. } | Self::Leave { .. } => Delivery::FanOut,
            Self::Offer(d) | Self::Answer(d) | Self::CandidateExchange(d) => {
                Delivery::Unicast(d.receiver_id)
            }
        }
    }

    /// Returns the opaque application data, `Null` for kinds without any.
    #[must_use]
    pub fn data(&self) -> &Value {
        match self {
            Self::Welcome { .. } => &NULL_DATA,
            Self::Leave { data, .. } => data,
            Self::Offer(d) | Self::Answer(d) | Self::CandidateExchange(d) => &d.data,
        }
    }

    /// Overwrites the sender with the identity of the connection the
    /// message actually arrived on.
    #[must_use]
    pub fn stamped(mut self, origin: ParticipantId) -> Self {
        match &mut self {
            Self::Welcome { sender_id } | Self::Leave { sender_id, .. } => *sender_id = origin,
            Self::Offer(d) | Self::Answer(d) | Self::CandidateExchange(d) => d.sender_id = origin,
        }
        self
    }
}
