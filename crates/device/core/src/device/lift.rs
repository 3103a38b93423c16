use tracing::{debug, info};

use super::{Ack, ActivationRecord, DeviceCtx, TimedDevice, broadcast_phase, live_views};
use crate::config::PhaseTimings;
use crate::error::DependencyError;
use crate::phase::{Activation, Phase, PhaseMachine};
use crate::replication::{Cue, OutcomeEntry, Outbox};
use crate::state::{DeviceId, DeviceMode, EntityKind, LiftStop, VolumeId};
use crate::transform::snap_to_nav;

/// Two-stop vertical transport.
///
/// Occupants of the current stop's volume are displaced by a fixed offset
/// rather than transformed; the stop flips when the ride is announced.
#[derive(Clone, Debug)]
pub struct Lift {
    pub(super) id: DeviceId,
    pub(super) top_volume: VolumeId,
    pub(super) bottom_volume: VolumeId,
    stop: LiftStop,
    pub(super) machine: PhaseMachine,
    record: Option<ActivationRecord>,
}

impl Lift {
    pub fn new(
        id: DeviceId,
        top_volume: VolumeId,
        bottom_volume: VolumeId,
        timings: PhaseTimings,
    ) -> Self {
        Self {
            id,
            top_volume,
            bottom_volume,
            stop: LiftStop::default(),
            machine: PhaseMachine::new(timings),
            record: None,
        }
    }

    #[must_use]
    pub fn at(mut self, stop: LiftStop) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop(&self) -> LiftStop {
        self.stop
    }

    fn departure_volume(&self) -> VolumeId {
        match self.stop {
            LiftStop::Top => self.top_volume,
            LiftStop::Bottom => self.bottom_volume,
        }
    }

    pub(super) fn request_activate(&mut self, outbox: &mut Outbox) -> Ack {
        match self.machine.request_activation() {
            Activation::Accepted { nonce } => {
                info!(target: "device::lift", device = %self.id, from = %self.stop, nonce, "ride started");
                broadcast_phase(self, Phase::Locking, outbox);
                Ack::Started { nonce }
            }
            Activation::Dropped => Ack::Dropped,
        }
    }

    fn resolve(&mut self, ctx: &mut DeviceCtx<'_, '_>) -> Result<(), DependencyError> {
        let volume = self.departure_volume();
        let snapshot = ctx.tracker.snapshot(volume)?;
        let world = &*ctx.env.world;
        let dy = ctx.env.config.lift.offset * self.stop.travel_sign();
        let nav_radius = ctx.env.config.nav_radius;

        let mut entries = Vec::with_capacity(snapshot.len());
        for view in live_views(self.id, &snapshot, world) {
            let (class, to) = match &view.kind {
                EntityKind::Object { held: true, .. } => {
                    debug!(target: "device::lift", handle = %view.handle, "held object rides with its holder");
                    continue;
                }
                EntityKind::Object { floor_position, .. } => {
                    (view.kind.class(), floor_position.offset_y(dy))
                }
                EntityKind::Player { .. } => (view.kind.class(), view.position.offset_y(dy)),
                EntityKind::Hostile { .. } => (
                    view.kind.class(),
                    snap_to_nav(world, view.position.offset_y(dy), nav_radius),
                ),
            };
            entries.push(OutcomeEntry::Displaced {
                target: view.handle,
                class,
                to,
            });
        }

        for entry in &entries {
            ctx.tracker.evict(entry.subject());
        }

        let nonce = self.machine.nonce();
        info!(target: "device::lift", device = %self.id, nonce, riders = entries.len(), "resolved");
        self.record = Some(ActivationRecord {
            nonce,
            snapshot,
            entries,
        });
        Ok(())
    }

    fn announce(&mut self, outbox: &mut Outbox) {
        let record = self.record.take().unwrap_or_default();
        outbox.batch(self.id, record.nonce, self.mode(), false, record.entries);
        self.stop = self.stop.opposite();
        outbox.mode_changed(self.id, self.mode(), None);
    }
}

impl TimedDevice for Lift {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn mode(&self) -> DeviceMode {
        DeviceMode::Lift(self.stop)
    }

    fn machine(&mut self) -> &mut PhaseMachine {
        &mut self.machine
    }

    fn cue(&self, phase: Phase) -> Option<Cue> {
        match phase {
            Phase::Locking => Some(Cue::LiftDepart),
            Phase::Announcing => Some(Cue::LiftArrive),
            _ => None,
        }
    }

    fn enter(&mut self, phase: Phase, ctx: &mut DeviceCtx<'_, '_>) -> Result<(), DependencyError> {
        match phase {
            Phase::Resolving => self.resolve(ctx),
            Phase::Announcing => {
                self.announce(ctx.outbox);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn reset(&mut self) {
        self.record = None;
    }
}
