//! Domain layer: participant identity, control messages, and the registry.
//!
//! The registry actor in [`registry`] owns the set of connected
//! participants; [`router`] holds its dispatch rules. Everything else a
//! connection needs to talk to it is re-exported here.

pub mod participant;
pub mod participant_id;
pub mod registry;
pub mod router;
pub mod signal;

pub use participant::{OutboundReceiver, Participant, PendingParticipant};
pub use participant_id::ParticipantId;
pub use registry::{Registry, RegistryConfig, RegistryHandle};
pub use signal::{Delivery, Directed, MessageKind, SignalMessage};
