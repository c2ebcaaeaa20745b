//! Participant registry: the single actor that owns the room.
//!
//! [`Registry`] keeps every connected participant in a `BTreeMap` that
//! only its own task ever touches. Connection pumps talk to it through a
//! cloneable [`RegistryHandle`], which submits register, unregister and
//! route requests over one ordered command channel.
//!
//! # Concurrency
//!
//! - Exactly one request is processed at a time, so every state
//!   transition happens in a single total order and no lock is needed.
//! - Requests from one producer are processed in submission order because
//!   all three kinds share the same FIFO channel.
//! - A fan-out observes the mapping as it is at that instant; no other
//!   request can interleave with it.
//! - A unicast delivery waits for room in the recipient's queue. That wait
//!   is bounded by [`RegistryConfig::unicast_timeout`]; with no bound a
//!   stalled recipient stalls the whole registry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::participant::{Participant, PendingParticipant};
use super::{ParticipantId, SignalMessage};
use crate::error::RelayError;

/// Default bound on a blocking unicast delivery.
pub const DEFAULT_UNICAST_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables of the registry actor.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long a unicast delivery may wait for room in the recipient's
    /// queue before the recipient is evicted. `None` waits forever.
    pub unicast_timeout: Option<Duration>,

    /// Fan out a `Leave` on behalf of a participant removed by
    /// [`RegistryHandle::unregister`]. Off by default: peers are only told
    /// about departures the client announces itself.
    pub synthesize_leave_on_disconnect: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            unicast_timeout: Some(DEFAULT_UNICAST_TIMEOUT),
            synthesize_leave_on_disconnect: false,
        }
    }
}

#[derive(Debug)]
enum Command {
    Register {
        participant: PendingParticipant,
        reply: oneshot::Sender<ParticipantId>,
    },
    Unregister(ParticipantId),
    Route {
        origin: ParticipantId,
        message: SignalMessage,
    },
}

/// Cloneable front of a running [`Registry`].
///
/// Every method only hands a request to the registry task; none of them
/// reports routing outcomes. The only error is [`RelayError::RegistryClosed`],
/// returned once the task has stopped.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    commands: mpsc::Sender<Command>,
    participants: Arc<AtomicUsize>,
}

impl RegistryHandle {
    /// Admits a participant and returns its newly assigned identity.
    ///
    /// Every participant already registered receives a `Welcome` naming
    /// the new identity before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RegistryClosed`] if the registry task has stopped.
    pub async fn register(
        &self,
        participant: PendingParticipant,
    ) -> Result<ParticipantId, RelayError> {
        let (reply, assigned) = oneshot::channel();
        self.commands
            .send(Command::Register { participant, reply })
            .await
            .map_err(|_| RelayError::RegistryClosed)?;
        assigned.await.map_err(|_| RelayError::RegistryClosed)
    }

    /// Removes a participant and closes its outbound queue.
    ///
    /// Unregistering an identity that is not present is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RegistryClosed`] if the registry task has stopped.
    pub async fn unregister(&self, id: ParticipantId) -> Result<(), RelayError> {
        self.commands
            .send(Command::Unregister(id))
            .await
            .map_err(|_| RelayError::RegistryClosed)
    }

    /// Submits a message that arrived on `origin`'s connection for routing.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RegistryClosed`] if the registry task has stopped.
    pub async fn route(
        &self,
        origin: ParticipantId,
        message: SignalMessage,
    ) -> Result<(), RelayError> {
        self.commands
            .send(Command::Route { origin, message })
            .await
            .map_err(|_| RelayError::RegistryClosed)
    }

    /// Number of registered participants after the last processed request.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.load(Ordering::Relaxed)
    }

    /// Returns `true` once the registry task has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// The registry actor. Owns the identity counter and the participant map.
#[derive(Debug)]
pub struct Registry {
    pub(super) participants: BTreeMap<ParticipantId, Participant>,
    next_id: ParticipantId,
    pub(super) config: RegistryConfig,
    gauge: Arc<AtomicUsize>,
}

impl Registry {
    /// Spawns a new registry task on the current tokio runtime and returns
    /// a handle to it.
    ///
    /// The task runs until every clone of the handle has been dropped.
    #[must_use]
    pub fn spawn(config: RegistryConfig) -> RegistryHandle {
        // One slot: submitting a request is as close to a direct hand-off
        // as a tokio channel allows.
        let (commands, rx) = mpsc::channel(1);
        let gauge = Arc::new(AtomicUsize::new(0));
        let registry = Self {
            participants: BTreeMap::new(),
            next_id: ParticipantId::FIRST,
            config,
            gauge: Arc::clone(&gauge),
        };
        tokio::spawn(registry.run(rx));
        RegistryHandle {
            commands,
            participants: gauge,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        tracing::info!(
            unicast_timeout_ms = self
                .config
                .unicast_timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
            synthesize_leave = self.config.synthesize_leave_on_disconnect,
            "participant registry started"
        );

        while let Some(command) = commands.recv().await {
            match command {
                Command::Register { participant, reply } => {
                    let id = self.register(participant);
                    if reply.send(id).is_err() {
                        // The connection went away while waiting for its id.
                        self.remove(id, "abandoned");
                    }
                }
                Command::Unregister(id) => self.unregister(id),
                Command::Route { origin, message } => self.route(origin, message).await,
            }
        }

        tracing::info!(
            remaining = self.participants.len(),
            "participant registry stopped"
        );
    }

    fn register(&mut self, participant: PendingParticipant) -> ParticipantId {
        let id = self.next_id;
        self.next_id = id.next();
        self.participants.insert(id, participant.admit(id));
        self.update_gauge();
        tracing::info!(
            participant_id = %id,
            participants = self.participants.len(),
            "participant registered"
        );

        self.fan_out(id, &SignalMessage::Welcome { sender_id: id });
        id
    }

    fn unregister(&mut self, id: ParticipantId) {
        if self.remove(id, "disconnected").is_none() {
            tracing::debug!(participant_id = %id, "unregister of unknown participant ignored");
            return;
        }
        if self.config.synthesize_leave_on_disconnect {
            let leave = SignalMessage::Leave {
                sender_id: id,
                data: Value::Null,
            };
            self.fan_out(id, &leave);
        }
    }

    /// Drops a participant from the map, which closes its outbound queue.
    pub(super) fn remove(
        &mut self,
        id: ParticipantId,
        reason: &'static str,
    ) -> Option<Participant> {
        let removed = self.participants.remove(&id)?;
        self.update_gauge();
        let connected_secs = (chrono::Utc::now() - removed.joined_at).num_seconds();
        tracing::info!(
            participant_id = %id,
            reason,
            frames_sent = removed.frames_sent,
            connected_secs,
            participants = self.participants.len(),
            "participant removed"
        );
        Some(removed)
    }

    fn update_gauge(&self) {
        self.gauge.store(self.participants.len(), Ordering::Relaxed);
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use super::*;
    use crate::domain::Directed;
    use crate::domain::participant::OutboundReceiver;
    use crate::ws::messages::Envelope;

    const WAIT: Duration = Duration::from_secs(1);

    async fn join(handle: &RegistryHandle, capacity: usize) -> (ParticipantId, OutboundReceiver) {
        let (pending, rx) = PendingParticipant::new(capacity);
        let Ok(id) = handle.register(pending).await else {
            panic!("registry closed");
        };
        (id, rx)
    }

    /// Registers a throwaway participant. Because requests are processed in
    /// order, everything submitted earlier has been handled once this returns.
    async fn barrier(handle: &RegistryHandle) -> ParticipantId {
        let (id, _rx) = join(handle, 1).await;
        id
    }

    fn parse(frame: &str) -> Envelope {
        let Ok(envelope) = serde_json::from_str::<Envelope>(frame) else {
            panic!("frame is not an envelope: {frame}");
        };
        envelope
    }

    /// Frames currently queued, ignoring welcomes caused by `ignore_sender`.
    fn drain(rx: &mut OutboundReceiver, ignore_sender: ParticipantId) -> Vec<Envelope> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let envelope = parse(&frame);
            if !(envelope.typ == 0 && envelope.sender_id == ignore_sender.get()) {
                frames.push(envelope);
            }
        }
        frames
    }

    async fn next(rx: &mut OutboundReceiver) -> Envelope {
        let Ok(Some(frame)) = timeout(WAIT, rx.recv()).await else {
            panic!("expected a frame");
        };
        parse(&frame)
    }

    fn offer(from: u64, to: u64) -> SignalMessage {
        SignalMessage::Offer(Directed {
            sender_id: ParticipantId::new(from),
            receiver_id: ParticipantId::new(to),
            data: json!({"type": "offer", "sdp": "v=0"}),
        })
    }

    #[tokio::test]
    async fn sequential_registrations_get_consecutive_ids() {
        let handle = Registry::spawn(RegistryConfig::default());
        let mut queues = Vec::new();
        for expected in 1..=5u64 {
            let (id, rx) = join(&handle, 16).await;
            assert_eq!(id.get(), expected);
            queues.push(rx);
        }
        assert_eq!(handle.participant_count(), 5);
    }

    #[tokio::test]
    async fn first_participant_receives_no_welcome() {
        let handle = Registry::spawn(RegistryConfig::default());
        let (a, mut rx_a) = join(&handle, 16).await;
        assert_eq!(a, ParticipantId::FIRST);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn welcome_reaches_every_earlier_participant_once() {
        let handle = Registry::spawn(RegistryConfig::default());
        let (a, mut rx_a) = join(&handle, 16).await;
        let (b, mut rx_b) = join(&handle, 16).await;
        let (c, mut rx_c) = join(&handle, 16).await;

        let seen_a = drain(&mut rx_a, ParticipantId::new(0));
        let seen_b = drain(&mut rx_b, ParticipantId::new(0));
        let seen_c = drain(&mut rx_c, ParticipantId::new(0));

        let welcome = |sender: ParticipantId, receiver: ParticipantId| Envelope {
            typ: 0,
            data: Value::Null,
            receiver_id: receiver.get(),
            sender_id: sender.get(),
        };
        assert_eq!(seen_a, vec![welcome(b, a), welcome(c, a)]);
        assert_eq!(seen_b, vec![welcome(c, b)]);
        assert!(seen_c.is_empty());
    }

    #[tokio::test]
    async fn unregister_twice_is_a_no_op() {
        let handle = Registry::spawn(RegistryConfig::default());
        let (_a, mut rx_a) = join(&handle, 16).await;
        let (b, mut rx_b) = join(&handle, 16).await;

        assert!(handle.unregister(b).await.is_ok());
        assert!(handle.unregister(b).await.is_ok());
        let fence = barrier(&handle).await;

        assert_eq!(handle.participant_count(), 2);
        // b was welcomed by nobody and its queue is now closed.
        assert_eq!(rx_b.recv().await, None);
        // a saw b join and nothing about the double unregister.
        let seen = drain(&mut rx_a, fence);
        assert_eq!(seen.len(), 1);
        assert!(seen.iter().all(|e| e.typ == 0 && e.sender_id == b.get()));
    }

    #[tokio::test]
    async fn leave_fans_out_to_everyone_but_the_sender() {
        let handle = Registry::spawn(RegistryConfig::default());
        let (a, mut rx_a) = join(&handle, 16).await;
        let (b, mut rx_b) = join(&handle, 16).await;
        let (c, mut rx_c) = join(&handle, 16).await;
        let _ = drain(&mut rx_a, ParticipantId::new(0));
        let _ = drain(&mut rx_b, ParticipantId::new(0));

        let leave = SignalMessage::Leave {
            sender_id: b,
            data: Value::Null,
        };
        assert!(handle.route(b, leave).await.is_ok());
        let fence = barrier(&handle).await;

        let to_a = drain(&mut rx_a, fence);
        let to_b = drain(&mut rx_b, fence);
        let to_c = drain(&mut rx_c, fence);
        assert_eq!(to_a.len(), 1);
        assert_eq!(to_c.len(), 1);
        assert!(to_b.is_empty());
        let is_leave_for = |e: &Envelope, to: ParticipantId| {
            e.typ == 4 && e.sender_id == b.get() && e.receiver_id == to.get()
        };
        assert!(to_a.iter().all(|e| is_leave_for(e, a)));
        assert!(to_c.iter().all(|e| is_leave_for(e, c)));
    }

    #[tokio::test]
    async fn offer_is_delivered_verbatim_to_its_receiver_only() {
        let handle = Registry::spawn(RegistryConfig::default());
        let (a, mut rx_a) = join(&handle, 16).await;
        let (b, mut rx_b) = join(&handle, 16).await;
        let (_c, mut rx_c) = join(&handle, 16).await;
        let _ = drain(&mut rx_a, ParticipantId::new(0));
        let _ = drain(&mut rx_b, ParticipantId::new(0));

        assert!(handle.route(a, offer(a.get(), b.get())).await.is_ok());
        let received = next(&mut rx_b).await;
        assert_eq!(
            received,
            Envelope {
                typ: 1,
                data: json!({"type": "offer", "sdp": "v=0"}),
                receiver_id: b.get(),
                sender_id: a.get(),
            }
        );

        let fence = barrier(&handle).await;
        assert!(drain(&mut rx_a, fence).is_empty());
        assert!(drain(&mut rx_c, fence).is_empty());
    }

    #[tokio::test]
    async fn unicast_to_unknown_receiver_is_dropped() {
        let handle = Registry::spawn(RegistryConfig::default());
        let (a, mut rx_a) = join(&handle, 16).await;
        let (b, mut rx_b) = join(&handle, 16).await;
        let _ = drain(&mut rx_a, ParticipantId::new(0));

        for message in [
            offer(b.get(), 999),
            SignalMessage::Answer(Directed {
                sender_id: b,
                receiver_id: ParticipantId::new(999),
                data: Value::Null,
            }),
            SignalMessage::CandidateExchange(Directed {
                sender_id: b,
                receiver_id: ParticipantId::new(0),
                data: Value::Null,
            }),
        ] {
            assert!(handle.route(b, message).await.is_ok());
        }
        let fence = barrier(&handle).await;

        assert!(drain(&mut rx_a, fence).is_empty());
        assert!(drain(&mut rx_b, fence).is_empty());
        assert_eq!(handle.participant_count(), 3);
        assert!(!handle.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_form_a_permutation() {
        const M: u64 = 64;
        let handle = Registry::spawn(RegistryConfig::default());

        let mut tasks = Vec::new();
        for _ in 0..M {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let (pending, rx) = PendingParticipant::new(128);
                handle.register(pending).await.map(|id| (id, rx))
            }));
        }

        let mut ids = Vec::new();
        let mut queues = Vec::new();
        for task in tasks {
            let Ok(Ok((id, rx))) = task.await else {
                panic!("registration failed");
            };
            ids.push(id.get());
            queues.push(rx);
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=M).collect::<Vec<_>>());
        assert_eq!(handle.participant_count(), queues.len());
    }

    #[tokio::test]
    async fn full_queue_evicts_recipient_during_fan_out() {
        let handle = Registry::spawn(RegistryConfig::default());
        let (_slow, mut rx_slow) = join(&handle, 1).await;
        let (_b, mut rx_b) = join(&handle, 16).await;
        let (c, _rx_c) = join(&handle, 16).await;
        let (d, _rx_d) = join(&handle, 16).await;

        // slow holds b's welcome; c's welcome found the queue full.
        let first = next(&mut rx_slow).await;
        assert_eq!(first.typ, 0);
        assert_eq!(rx_slow.recv().await, None);

        // b was unaffected and saw both later joins.
        let seen_b = drain(&mut rx_b, ParticipantId::new(0));
        let senders: Vec<u64> = seen_b.iter().map(|e| e.sender_id).collect();
        assert_eq!(senders, vec![c.get(), d.get()]);
        assert_eq!(handle.participant_count(), 3);
    }

    #[tokio::test]
    async fn unbounded_unicast_stalls_registry_until_recipient_drains() {
        let handle = Registry::spawn(RegistryConfig {
            unicast_timeout: None,
            synthesize_leave_on_disconnect: false,
        });
        let (a, mut rx_a) = join(&handle, 1).await;
        // a's single slot now holds b's welcome.
        let (b, _rx_b) = join(&handle, 16).await;

        assert!(handle.route(b, offer(b.get(), a.get())).await.is_ok());

        let stalled = handle.clone();
        let mut late = tokio::spawn(async move {
            let (pending, rx) = PendingParticipant::new(16);
            stalled.register(pending).await.map(|id| (id, rx))
        });
        assert!(
            timeout(Duration::from_millis(100), &mut late).await.is_err(),
            "registry should be blocked on the unicast"
        );

        let welcome = next(&mut rx_a).await;
        assert_eq!(welcome.typ, 0);
        let offered = next(&mut rx_a).await;
        assert_eq!(offered.typ, 1);
        assert_eq!(offered.sender_id, b.get());

        let Ok(Ok(Ok((c, _rx_c)))) = timeout(WAIT, late).await else {
            panic!("registry did not resume");
        };
        assert_eq!(c.get(), 3);
    }

    #[tokio::test]
    async fn bounded_unicast_evicts_stalled_recipient() {
        let handle = Registry::spawn(RegistryConfig {
            unicast_timeout: Some(Duration::from_millis(50)),
            synthesize_leave_on_disconnect: false,
        });
        let (a, mut rx_a) = join(&handle, 1).await;
        let (b, _rx_b) = join(&handle, 16).await;

        assert!(handle.route(b, offer(b.get(), a.get())).await.is_ok());

        let Ok((c, _rx_c)) = timeout(WAIT, join(&handle, 16)).await else {
            panic!("registry stayed blocked");
        };
        assert_eq!(c.get(), 3);
        assert_eq!(handle.participant_count(), 2);

        // a got b's welcome and then its queue was closed.
        let welcome = next(&mut rx_a).await;
        assert_eq!(welcome.sender_id, b.get());
        assert_eq!(rx_a.recv().await, None);
    }

    #[tokio::test]
    async fn disconnect_without_leave_is_silent_by_default() {
        let handle = Registry::spawn(RegistryConfig::default());
        let (_a, mut rx_a) = join(&handle, 16).await;
        let (b, _rx_b) = join(&handle, 16).await;
        let _ = drain(&mut rx_a, ParticipantId::new(0));

        assert!(handle.unregister(b).await.is_ok());
        let fence = barrier(&handle).await;
        assert!(drain(&mut rx_a, fence).is_empty());
    }

    #[tokio::test]
    async fn disconnect_synthesizes_leave_when_enabled() {
        let handle = Registry::spawn(RegistryConfig {
            synthesize_leave_on_disconnect: true,
            ..RegistryConfig::default()
        });
        let (a, mut rx_a) = join(&handle, 16).await;
        let (b, _rx_b) = join(&handle, 16).await;
        let _ = drain(&mut rx_a, ParticipantId::new(0));

        assert!(handle.unregister(b).await.is_ok());
        let leave = next(&mut rx_a).await;
        assert_eq!(
            leave,
            Envelope {
                typ: 4,
                data: Value::Null,
                receiver_id: a.get(),
                sender_id: b.get(),
            }
        );

        // A second unregister removes nothing and announces nothing.
        assert!(handle.unregister(b).await.is_ok());
        let fence = barrier(&handle).await;
        assert!(drain(&mut rx_a, fence).is_empty());
    }
}
