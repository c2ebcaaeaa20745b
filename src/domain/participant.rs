//! Participant record combining an identity with its outbound queue.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};

use super::ParticipantId;
use crate::error::RelayError;

/// Receiving half of a participant's outbound queue, drained by its
/// connection pump.
pub type OutboundReceiver = mpsc::Receiver<String>;

/// A participant that has been constructed for a new connection but not
/// yet admitted by the registry. It has no identity.
#[derive(Debug)]
pub struct PendingParticipant {
    outbound: mpsc::Sender<String>,
}

impl PendingParticipant {
    /// Creates a pending participant and the receiving half of its
    /// bounded outbound queue.
    ///
    /// A `capacity` of zero is raised to one; tokio channels need at least
    /// one slot.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, OutboundReceiver) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        (Self { outbound }, rx)
    }

    /// Assigns an identity, turning this into a registered [`Participant`].
    pub(crate) fn admit(self, id: ParticipantId) -> Participant {
        Participant {
            id,
            outbound: self.outbound,
            joined_at: Utc::now(),
            frames_sent: 0,
        }
    }
}

/// A registered participant as stored in the registry.
///
/// The registry holds the only sender of the outbound queue, so dropping
/// a `Participant` closes its queue and the pump sees end-of-stream.
#[derive(Debug)]
pub struct Participant {
    /// Identity assigned at registration (immutable).
    pub id: ParticipantId,

    outbound: mpsc::Sender<String>,

    /// Registration timestamp.
    pub joined_at: DateTime<Utc>,

    /// Frames successfully enqueued for this participant.
    pub frames_sent: u64,
}

impl Participant {
    /// Enqueues a frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UnresponsiveRecipient`] if the queue is full
    /// or its receiver has gone away.
    pub fn try_deliver(&mut self, frame: String) -> Result<(), RelayError> {
        match self.outbound.try_send(frame) {
            Ok(()) => {
                self.frames_sent = self.frames_sent.saturating_add(1);
                Ok(())
            }
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
                Err(RelayError::UnresponsiveRecipient(self.id))
            }
        }
    }

    /// Enqueues a frame, waiting for room in the queue.
    ///
    /// With `timeout` set to `None` this waits for as long as the pump
    /// takes to drain, which stalls the caller.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UnresponsiveRecipient`] if the receiver has
    /// gone away or the timeout elapsed before room became available.
    pub async fn deliver(
        &mut self,
        frame: String,
        timeout: Option<Duration>,
    ) -> Result<(), RelayError> {
        let sent = match timeout {
            Some(limit) => self
                .outbound
                .send_timeout(frame, limit)
                .await
                .map_err(|e| match e {
                    SendTimeoutError::Timeout(_) | SendTimeoutError::Closed(_) => {
                        RelayError::UnresponsiveRecipient(self.id)
                    }
                }),
            None => self
                .outbound
                .send(frame)
                .await
                .map_err(|_| RelayError::UnresponsiveRecipient(self.id)),
        };
        if sent.is_ok() {
            self.frames_sent = self.frames_sent.saturating_add(1);
        }
        sent
    }
}
