//! Runtime orchestration for networked device sessions.
//!
//! This crate hosts the authority side of a session on tokio: a worker that
//! owns every device, the containment tracker and the authoritative world,
//! driven by trigger events, advisory requests and a scheduler tick.
//! Participants join through [`RuntimeHandle::join`] and mirror the session
//! by applying replication frames to their own world.
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides the topic event bus that doubles as transport
//! - [`wire`] frames replication messages for that transport
//! - [`world`] holds the in-memory world used by the headless session
//! - `workers` keeps background tasks internal to the crate
pub mod api;
pub mod events;
pub mod runtime;
pub mod wire;
pub mod world;

mod workers;

pub use api::{DeviceStatus, FollowerHandle, Result, RuntimeError, RuntimeHandle};
pub use events::{Event, EventBus, FollowerLag, ParticipantId, PresentationEvent, Topic};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use wire::{ReplicationFrame, WireError, decode, encode};
pub use world::{EntityRecord, InMemoryWorld, MAX_HEALTH};
