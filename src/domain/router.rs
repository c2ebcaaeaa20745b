//! Message dispatch for the registry actor.
//!
//! Fan-out kinds (`Welcome`, `Leave`) go to every participant except the
//! originator and never wait: a recipient whose queue is full is evicted
//! on the spot. Unicast kinds (`Offer`, `Answer`, `CandidateExchange`) go
//! to the named receiver only and wait for queue room, up to the configured
//! timeout. Nothing is ever reported back to the sender.

use super::registry::Registry;
use super::{Delivery, ParticipantId, SignalMessage};
use crate::error::RelayError;
use crate::ws::messages::Envelope;

impl Registry {
    /// Dispatches one message that arrived on `origin`'s connection.
    pub(super) async fn route(&mut self, origin: ParticipantId, message: SignalMessage) {
        tracing::debug!(
            participant_id = %origin,
            kind = %message.kind(),
            "routing message"
        );
        match message.delivery() {
            Delivery::FanOut => self.fan_out(origin, &message),
            Delivery::Unicast(receiver) => self.unicast(receiver, &message).await,
        }
    }

    /// Delivers a copy of `message` to everyone but `origin`, each copy
    /// addressed to its recipient.
    pub(super) fn fan_out(&mut self, origin: ParticipantId, message: &SignalMessage) {
        let mut unresponsive = Vec::new();

        for (&id, participant) in &mut self.participants {
            if id == origin {
                continue;
            }
            let frame = match Envelope::for_recipient(message, id).encode() {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::error!(
                        %err,
                        receiver_id = %id,
                        kind = %message.kind(),
                        "dropping delivery"
                    );
                    continue;
                }
            };
            if let Err(err) = participant.try_deliver(frame) {
                tracing::warn!(%err, kind = %message.kind(), "evicting participant");
                unresponsive.push(id);
            }
        }

        for id in unresponsive {
            self.remove(id, "unresponsive");
        }
    }

    async fn unicast(&mut self, receiver: ParticipantId, message: &SignalMessage) {
        let timeout = self.config.unicast_timeout;
        let Some(participant) = self.participants.get_mut(&receiver) else {
            let err = RelayError::UnknownReceiver(receiver);
            tracing::warn!(
                %err,
                sender_id = %message.sender_id(),
                kind = %message.kind(),
                "dropping message"
            );
            return;
        };

        let frame = match Envelope::for_recipient(message, receiver).encode() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(
                    %err,
                    receiver_id = %receiver,
                    kind = %message.kind(),
                    "dropping delivery"
                );
                return;
            }
        };

        if let Err(err) = participant.deliver(frame, timeout).await {
            tracing::warn!(%err, kind = %message.kind(), "evicting participant");
            self.remove(receiver, "unresponsive");
        }
    }
}
