//! Concrete devices and the registry that drives them.
//!
//! Each device pairs a [`PhaseMachine`] with its own resolution logic.
//! [`DeviceSet`] owns the devices, the containment tracker and the outbox,
//! and is the only entry point the runtime uses: trigger events, activation
//! and mode-advance requests, and scheduler ticks.
mod converter;
mod door;
mod lift;

pub use converter::Converter;
pub use door::Door;
pub use lift::Lift;

use core::time::Duration;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error, warn};

use crate::containment::{ContainmentSet, ContainmentTracker};
use crate::env::{AuthorityEnv, Role, World};
use crate::error::{DependencyError, DeviceError, DeviceFault, ErrorSeverity};
use crate::phase::{Phase, PhaseMachine};
use crate::replication::{Cue, OutcomeEntry, Outbox, ReplicationMessage};
use crate::state::{DeviceId, DeviceMode, EntityHandle, EntityView, VolumeId};

/// Answer to an advisory request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ack {
    /// An activation cycle started.
    Started { nonce: u64 },
    /// The request took effect immediately (dial turned, door closed).
    Applied,
    /// The device was busy.
    Dropped,
    /// The device does not support the request.
    Ignored,
}

/// Per-activation scratch, discarded after the batch is announced.
#[derive(Clone, Debug, Default)]
pub struct ActivationRecord {
    pub nonce: u64,
    pub snapshot: ContainmentSet,
    pub entries: Vec<OutcomeEntry>,
}

/// Problem reported from a tick, e.g. an aborted activation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    pub device: DeviceId,
    pub severity: ErrorSeverity,
    pub code: String,
    pub message: String,
}

impl Diagnostic {
    pub fn from_fault(device: DeviceId, fault: &dyn DeviceFault) -> Self {
        Self {
            device,
            severity: fault.severity(),
            code: fault.error_code().to_owned(),
            message: fault.to_string(),
        }
    }
}

/// Mutable collaborators lent to a device for one call.
pub struct DeviceCtx<'c, 'a> {
    pub tracker: &'c mut ContainmentTracker,
    pub outbox: &'c mut Outbox,
    pub env: &'c mut AuthorityEnv<'a>,
}

/// Shared sequencing for every device kind.
trait TimedDevice {
    fn id(&self) -> DeviceId;

    fn mode(&self) -> DeviceMode;

    fn machine(&mut self) -> &mut PhaseMachine;

    /// Cue broadcast with the transition into `phase`.
    fn cue(&self, _phase: Phase) -> Option<Cue> {
        None
    }

    /// Device work for the phase just entered, after its broadcast.
    fn enter(&mut self, _phase: Phase, _ctx: &mut DeviceCtx<'_, '_>) -> Result<(), DependencyError> {
        Ok(())
    }

    /// Clears per-activation state after an abort.
    fn reset(&mut self);
}

fn broadcast_phase<D: TimedDevice>(device: &D, phase: Phase, outbox: &mut Outbox) {
    outbox.phase_changed(device.id(), phase, device.mode(), device.cue(phase));
}

/// Consumes `elapsed`, entering and handling phases in order. A dependency
/// failure aborts the cycle back to a controllable idle state.
fn drive<D: TimedDevice>(
    device: &mut D,
    elapsed: Duration,
    ctx: &mut DeviceCtx<'_, '_>,
) -> Option<Diagnostic> {
    let mut budget = elapsed;
    while let Some(phase) = device.machine().step(&mut budget) {
        broadcast_phase(device, phase, ctx.outbox);
        if let Err(err) = device.enter(phase, ctx) {
            let id = device.id();
            error!(target: "device::phase", device = %id, %phase, code = err.error_code(), %err, "activation aborted");
            device.machine().abort();
            device.reset();
            broadcast_phase(device, Phase::Idle, ctx.outbox);
            return Some(Diagnostic::from_fault(id, &err));
        }
    }
    None
}

/// Resolves the snapshot to live views, dropping expired handles and extra
/// parts of an actor whose root was already seen.
fn live_views(device: DeviceId, snapshot: &ContainmentSet, world: &dyn World) -> Vec<EntityView> {
    let mut roots: BTreeSet<EntityHandle> = BTreeSet::new();
    let mut views = Vec::with_capacity(snapshot.len());
    for handle in snapshot.iter() {
        let Some(view) = world.entity(handle) else {
            debug!(target: "device::phase", %device, %handle, "snapshot handle expired");
            continue;
        };
        if !roots.insert(view.root) {
            warn!(target: "device::phase", %device, %handle, root = %view.root, "root already handled this cycle");
            continue;
        }
        views.push(view);
    }
    views
}

/// Closed set of device placements.
#[derive(Clone, Debug)]
pub enum Device {
    Converter(Converter),
    Lift(Lift),
    Door(Door),
}

impl Device {
    pub fn id(&self) -> DeviceId {
        match self {
            Device::Converter(device) => device.id(),
            Device::Lift(device) => device.id(),
            Device::Door(device) => device.id(),
        }
    }

    pub fn mode(&self) -> DeviceMode {
        match self {
            Device::Converter(device) => device.mode(),
            Device::Lift(device) => device.mode(),
            Device::Door(device) => device.mode(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.machine_ref().phase()
    }

    pub fn is_busy(&self) -> bool {
        self.machine_ref().is_busy()
    }

    fn machine_ref(&self) -> &PhaseMachine {
        match self {
            Device::Converter(device) => &device.machine,
            Device::Lift(device) => &device.machine,
            Device::Door(device) => &device.machine,
        }
    }

    /// Trigger volumes the device reads.
    pub fn volumes(&self) -> Vec<VolumeId> {
        match self {
            Device::Converter(device) => vec![device.chamber],
            Device::Lift(device) => vec![device.top_volume, device.bottom_volume],
            Device::Door(device) => vec![device.volume],
        }
    }
}

impl From<Converter> for Device {
    fn from(device: Converter) -> Self {
        Device::Converter(device)
    }
}

impl From<Lift> for Device {
    fn from(device: Lift) -> Self {
        Device::Lift(device)
    }
}

impl From<Door> for Device {
    fn from(device: Door) -> Self {
        Device::Door(device)
    }
}

/// Registry of devices owned by the authority.
#[derive(Debug)]
pub struct DeviceSet {
    devices: BTreeMap<DeviceId, Device>,
    tracker: ContainmentTracker,
    outbox: Outbox,
}

impl DeviceSet {
    pub fn new(role: Role) -> Self {
        Self {
            devices: BTreeMap::new(),
            tracker: ContainmentTracker::new(role),
            outbox: Outbox::new(),
        }
    }

    pub fn insert(&mut self, device: Device) -> Result<(), DeviceError> {
        let id = device.id();
        if self.devices.contains_key(&id) {
            return Err(DeviceError::DuplicateDevice(id));
        }
        for volume in device.volumes() {
            self.tracker.register(volume);
        }
        self.devices.insert(id, device);
        Ok(())
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn tracker(&self) -> &ContainmentTracker {
        &self.tracker
    }

    pub fn on_enter(&mut self, volume: VolumeId, handle: EntityHandle) -> bool {
        self.tracker.on_enter(volume, handle)
    }

    pub fn on_exit(&mut self, volume: VolumeId, handle: EntityHandle) -> bool {
        self.tracker.on_exit(volume, handle)
    }

    /// Forgets a destroyed entity in every volume.
    pub fn evict(&mut self, handle: EntityHandle) {
        self.tracker.evict(handle);
    }

    pub fn request_activate(
        &mut self,
        id: DeviceId,
        env: &mut AuthorityEnv<'_>,
    ) -> Result<Ack, DeviceError> {
        let device = self
            .devices
            .get_mut(&id)
            .ok_or(DeviceError::UnknownDevice(id))?;
        let config = env.config;
        let ack = match device {
            Device::Converter(device) => device.request_activate(&mut self.outbox),
            Device::Lift(device) => device.request_activate(&mut self.outbox),
            Device::Door(device) => device.request_toggle(&config.door, &mut self.outbox),
        };
        debug!(target: "device::phase", device = %id, ?ack, "activation requested");
        Ok(ack)
    }

    pub fn request_mode_advance(&mut self, id: DeviceId) -> Result<Ack, DeviceError> {
        let device = self
            .devices
            .get_mut(&id)
            .ok_or(DeviceError::UnknownDevice(id))?;
        let ack = match device {
            Device::Converter(device) => device.advance_setting(&mut self.outbox),
            Device::Lift(_) | Device::Door(_) => {
                debug!(target: "device::phase", device = %id, "mode advance not supported");
                Ack::Ignored
            }
        };
        Ok(ack)
    }

    /// Advances every device by `elapsed`; returns diagnostics for aborted cycles.
    pub fn tick(&mut self, elapsed: Duration, env: &mut AuthorityEnv<'_>) -> Vec<Diagnostic> {
        let mut ctx = DeviceCtx {
            tracker: &mut self.tracker,
            outbox: &mut self.outbox,
            env,
        };
        let mut diagnostics = Vec::new();
        for device in self.devices.values_mut() {
            let diagnostic = match device {
                Device::Converter(device) => drive(device, elapsed, &mut ctx),
                Device::Lift(device) => drive(device, elapsed, &mut ctx),
                Device::Door(device) => {
                    device.poll(&mut ctx);
                    drive(device, elapsed, &mut ctx)
                }
            };
            diagnostics.extend(diagnostic);
        }
        diagnostics
    }

    /// Messages emitted since the last drain, in order.
    pub fn drain_outbox(&mut self) -> Vec<ReplicationMessage> {
        self.outbox.drain()
    }
}
