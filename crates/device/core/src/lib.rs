//! Proximity-triggered, server-authoritative timed devices.
//!
//! `device-core` holds the rules shared by every participant: containment
//! tracking, outcome tables and their resolver, the tick-driven phase
//! machine, kind-specific effect application, and the replication contract
//! between the authority and its followers. Everything here is synchronous
//! and free of I/O; the runtime crate supplies time, transport and a world.
pub mod config;
pub mod containment;
pub mod device;
pub mod env;
pub mod error;
pub mod outcome;
pub mod phase;
pub mod replication;
pub mod state;
pub mod transform;

pub use config::{ConverterConfig, DeviceConfig, DoorConfig, LiftConfig, PhaseTimings};
pub use containment::{ContainmentSet, ContainmentTracker};
pub use device::{
    Ack, ActivationRecord, Converter, Device, DeviceCtx, DeviceSet, Diagnostic, Door, Lift,
};
pub use env::{
    AuthorityEnv, Catalog, HostileDefinition, ItemDefinition, PcgRng, PropsContainer, RngOracle,
    RollContext, Role, SessionContext, StaticCatalog, ValueRange, World, compute_seed,
};
pub use error::{
    DependencyError, DeviceError, DeviceFault, ErrorSeverity, ReplicaError, WorldError,
};
pub use outcome::{
    Candidate, CandidateColumns, OutcomeResolver, OutcomeTable, Resolution, ResolutionSource,
};
pub use phase::{Activation, Phase, PhaseMachine};
pub use replication::{
    ApplyReport, Cue, DeviceShadow, OutcomeBatch, OutcomeEntry, Outbox, PresentationIntent,
    Replica, ReplicaWorld, ReplicationMessage,
};
pub use state::{
    ConverterSetting, CosmeticId, DeviceId, DeviceMode, DoorState, EntityClass, EntityHandle,
    EntityKind, EntityView, HostileKey, Identity, ItemKey, LiftStop, Position, Region, VolumeId,
};
pub use transform::{EntityTransformer, PlayerEffect, PlayerEffectKind};
