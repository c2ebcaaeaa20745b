//! Wire envelope: the JSON object carried in every WebSocket text frame.
//!
//! ```json
//! {"typ": 1, "data": {"sdp": "..."}, "receiver_id": 2, "sender_id": 1}
//! ```
//!
//! `typ` is required on input. `data` defaults to `null` and the two ids
//! default to `0` because the browser client omits `sender_id` (the pump
//! stamps it) and fan-out kinds carry no receiver. Outbound envelopes
//! always carry all four fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Directed, MessageKind, ParticipantId, SignalMessage};
use crate::error::RelayError;

/// Integer-tagged envelope as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind tag, `0..=4`.
    pub typ: i64,
    /// Opaque application value.
    #[serde(default)]
    pub data: Value,
    /// Intended recipient.
    #[serde(default)]
    pub receiver_id: u64,
    /// Originating participant.
    #[serde(default)]
    pub sender_id: u64,
}

impl Envelope {
    /// Builds the envelope a given recipient sees for `message`.
    ///
    /// For unicast kinds `recipient` equals the message's own receiver, so
    /// the envelope is the one the sender submitted. For fan-out kinds each
    /// copy is addressed to its own recipient.
    #[must_use]
    pub fn for_recipient(message: &SignalMessage, recipient: ParticipantId) -> Self {
        Self {
            typ: message.kind().wire_tag(),
            data: message.data().clone(),
            receiver_id: recipient.get(),
            sender_id: message.sender_id().get(),
        }
    }

    /// Serializes the envelope into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Encoding`] if serialization fails.
    pub fn encode(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(RelayError::Encoding)
    }

    /// Parses a text frame into a typed message.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Decoding`] for malformed JSON and
    /// [`RelayError::UnknownMessageKind`] for an unrecognized `typ`.
    pub fn decode(text: &str) -> Result<SignalMessage, RelayError> {
        let envelope: Self = serde_json::from_str(text).map_err(RelayError::Decoding)?;
        SignalMessage::try_from(envelope)
    }
}

impl TryFrom<Envelope> for SignalMessage {
    type Error = RelayError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let kind = MessageKind::from_wire_tag(envelope.typ)
            .ok_or(RelayError::UnknownMessageKind(envelope.typ))?;
        let sender_id = ParticipantId::new(envelope.sender_id);
        let directed = || Directed {
            sender_id,
            receiver_id: ParticipantId::new(envelope.receiver_id),
            data: envelope.data.clone(),
        };
        Ok(match kind {
            MessageKind::Welcome => Self::Welcome { sender_id },
            MessageKind::Offer => Self::Offer(directed()),
            MessageKind::Answer => Self::Answer(directed()),
            MessageKind::CandidateExchange => Self::CandidateExchange(directed()),
            MessageKind::Leave => Self::Leave {
                sender_id,
                data: envelope.data.clone(),
            },
        })
    }
}
