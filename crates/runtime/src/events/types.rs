//! Event types for different topics.

use device_core::{DeviceId, Diagnostic, EntityHandle, PresentationIntent};
use serde::{Deserialize, Serialize};

use crate::wire::ReplicationFrame;

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Encoded replication frames from the authority
    Replication,
    /// Aborted activations, device faults and lagging followers
    Diagnostic,
    /// Intents for a participant's presentation layer
    Presentation,
}

/// Identifies a participant in presentation events. The host is `0`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ParticipantId(pub u32);

impl ParticipantId {
    pub const HOST: Self = Self(0);
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "participant-{}", self.0)
    }
}

/// One presentation intent produced when a participant applied a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationEvent {
    pub participant: ParticipantId,
    pub device: DeviceId,
    pub intent: PresentationIntent,
}

/// A follower missed replication frames and reloaded the authority's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerLag {
    pub participant: ParticipantId,
    pub skipped: u64,
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone)]
pub enum Event {
    Replication(ReplicationFrame),
    /// An entity destroyed outside of any device.
    Despawned(EntityHandle),
    Diagnostic(Diagnostic),
    Lagged(FollowerLag),
    Presentation(PresentationEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Replication(_) | Event::Despawned(_) => Topic::Replication,
            Event::Diagnostic(_) | Event::Lagged(_) => Topic::Diagnostic,
            Event::Presentation(_) => Topic::Presentation,
        }
    }
}
