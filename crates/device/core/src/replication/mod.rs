//! One-way replication contract between the authority and followers.
//!
//! Every externally visible change leaves the authority as a
//! [`ReplicationMessage`] stamped with a per-device sequence number. The
//! outcome of an activation always travels as a single [`OutcomeBatch`], so
//! a follower never sees occupants vanish without their replacements.
mod replica;

pub use replica::{ApplyReport, DeviceShadow, PresentationIntent, Replica, ReplicaWorld};

use std::collections::BTreeMap;

use crate::phase::Phase;
use crate::state::{DeviceId, DeviceMode, EntityClass, EntityHandle, Identity, Position};
use crate::transform::PlayerEffect;

/// Presentation cue attached to a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum Cue {
    DialTurn,
    ConverterRefine,
    DoorOpen,
    DoorOpenFast,
    DoorClose,
    LiftDepart,
    LiftArrive,
}

/// What happened to one occupant.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutcomeEntry {
    /// `source` was destroyed and `instance` spawned in its place.
    Spawned {
        source: EntityHandle,
        instance: EntityHandle,
        identity: Identity,
        position: Position,
        value: Option<u32>,
    },
    /// `source` was destroyed with no replacement.
    Destroyed { source: EntityHandle },
    /// Player relocated, then given its setting effect (if any).
    Player {
        player: EntityHandle,
        relocate: Position,
        effect: Option<PlayerEffect>,
    },
    /// Entity moved by a transport.
    Displaced {
        target: EntityHandle,
        class: EntityClass,
        to: Position,
    },
}

impl OutcomeEntry {
    /// Entity the entry was produced for.
    pub fn subject(&self) -> EntityHandle {
        match self {
            OutcomeEntry::Spawned { source, .. } | OutcomeEntry::Destroyed { source } => *source,
            OutcomeEntry::Player { player, .. } => *player,
            OutcomeEntry::Displaced { target, .. } => *target,
        }
    }
}

/// All outcomes of one activation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutcomeBatch {
    pub device: DeviceId,
    pub seq: u64,
    /// Nonce of the activation that produced the batch.
    pub activation: u64,
    pub mode: DeviceMode,
    /// Battery-powered spawns come out fully charged.
    pub battery_charged: bool,
    pub entries: Vec<OutcomeEntry>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReplicationMessage {
    PhaseChanged {
        device: DeviceId,
        seq: u64,
        phase: Phase,
        mode: DeviceMode,
        cue: Option<Cue>,
    },
    OutcomeBatch(OutcomeBatch),
    ModeChanged {
        device: DeviceId,
        seq: u64,
        mode: DeviceMode,
        cue: Option<Cue>,
    },
}

impl ReplicationMessage {
    pub fn device(&self) -> DeviceId {
        match self {
            ReplicationMessage::PhaseChanged { device, .. }
            | ReplicationMessage::ModeChanged { device, .. } => *device,
            ReplicationMessage::OutcomeBatch(batch) => batch.device,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            ReplicationMessage::PhaseChanged { seq, .. }
            | ReplicationMessage::ModeChanged { seq, .. } => *seq,
            ReplicationMessage::OutcomeBatch(batch) => batch.seq,
        }
    }
}

/// Pending messages in emission order, with per-device sequence counters.
#[derive(Clone, Debug, Default)]
pub struct Outbox {
    seqs: BTreeMap<DeviceId, u64>,
    pending: Vec<ReplicationMessage>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self, device: DeviceId) -> u64 {
        let seq = self.seqs.entry(device).or_insert(0);
        *seq += 1;
        *seq
    }

    pub fn phase_changed(&mut self, device: DeviceId, phase: Phase, mode: DeviceMode, cue: Option<Cue>) {
        let seq = self.next_seq(device);
        self.pending.push(ReplicationMessage::PhaseChanged {
            device,
            seq,
            phase,
            mode,
            cue,
        });
    }

    pub fn mode_changed(&mut self, device: DeviceId, mode: DeviceMode, cue: Option<Cue>) {
        let seq = self.next_seq(device);
        self.pending
            .push(ReplicationMessage::ModeChanged { device, seq, mode, cue });
    }

    pub fn batch(
        &mut self,
        device: DeviceId,
        activation: u64,
        mode: DeviceMode,
        battery_charged: bool,
        entries: Vec<OutcomeEntry>,
    ) {
        let seq = self.next_seq(device);
        self.pending.push(ReplicationMessage::OutcomeBatch(OutcomeBatch {
            device,
            seq,
            activation,
            mode,
            battery_charged,
            entries,
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<ReplicationMessage> {
        std::mem::take(&mut self.pending)
    }
}
