use tracing::{debug, info, warn};

use super::{Ack, DeviceCtx, TimedDevice, broadcast_phase};
use crate::config::{DoorConfig, PhaseTimings};
use crate::phase::{Activation, Phase, PhaseMachine};
use crate::replication::{Cue, Outbox};
use crate::state::{DeviceId, DeviceMode, DoorState, EntityHandle, EntityKind, VolumeId};

/// Powered door opened by desire.
///
/// Each tick, while the door is shut and idle, the strongest hostile in its
/// volume whose door strength clears the open threshold starts an opening
/// cycle. The door opens, and stops blocking navigation, as soon as a cycle
/// is accepted; the cycle only keeps controls locked while it plays out. The
/// device never closes the door itself; closing is manual.
#[derive(Clone, Debug)]
pub struct Door {
    pub(super) id: DeviceId,
    pub(super) volume: VolumeId,
    state: DoorState,
    fast: bool,
    pub(super) machine: PhaseMachine,
}

impl Door {
    pub fn new(id: DeviceId, volume: VolumeId, timings: PhaseTimings) -> Self {
        Self {
            id,
            volume,
            state: DoorState::default(),
            fast: false,
            machine: PhaseMachine::new(timings),
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: DoorState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> DoorState {
        self.state
    }

    fn start_opening(&mut self, timings: PhaseTimings, fast: bool, outbox: &mut Outbox) -> Ack {
        match self.machine.request_activation_with(timings) {
            Activation::Accepted { nonce } => {
                self.fast = fast;
                self.state = DoorState::Open;
                broadcast_phase(self, Phase::Locking, outbox);
                outbox.mode_changed(self.id, self.mode(), None);
                Ack::Started { nonce }
            }
            Activation::Dropped => Ack::Dropped,
        }
    }

    /// Manual toggle: opens with a normal cycle, closes immediately.
    pub(super) fn request_toggle(&mut self, config: &DoorConfig, outbox: &mut Outbox) -> Ack {
        if self.machine.is_busy() || self.machine.phase() != Phase::Idle {
            return Ack::Dropped;
        }
        match self.state {
            DoorState::Closed => {
                info!(target: "device::door", device = %self.id, "manual open");
                self.start_opening(config.timings, false, outbox)
            }
            DoorState::Open => {
                info!(target: "device::door", device = %self.id, "manual close");
                self.state = DoorState::Closed;
                outbox.mode_changed(self.id, self.mode(), Some(Cue::DoorClose));
                Ack::Applied
            }
        }
    }

    /// Starts an opening cycle if a qualifying hostile wants through.
    pub(super) fn poll(&mut self, ctx: &mut DeviceCtx<'_, '_>) {
        if self.state.is_open() || self.machine.is_busy() || self.machine.phase() != Phase::Idle {
            return;
        }
        let snapshot = match ctx.tracker.snapshot(self.volume) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(target: "device::door", device = %self.id, %err, "door volume unavailable");
                return;
            }
        };

        let door = &ctx.env.config.door;
        let mut best: Option<(EntityHandle, f32)> = None;
        for handle in snapshot.iter() {
            let Some(view) = ctx.env.world.entity(handle) else {
                continue;
            };
            let EntityKind::Hostile {
                key,
                dead: false,
                door_strength,
            } = &view.kind
            else {
                continue;
            };
            let strength = door.strength_of(key, *door_strength);
            if strength <= door.open_threshold {
                continue;
            }
            // Strictly greater keeps the first candidate on ties.
            if best.is_none_or(|(_, current)| strength > current) {
                best = Some((handle, strength));
            }
        }

        let Some((opener, strength)) = best else {
            return;
        };
        let fast = strength > door.fast_threshold;
        debug!(target: "device::door", device = %self.id, %opener, strength, fast, "hostile opening door");
        self.start_opening(door.timings_for(strength), fast, ctx.outbox);
    }
}

impl TimedDevice for Door {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn mode(&self) -> DeviceMode {
        DeviceMode::Door(self.state)
    }

    fn machine(&mut self) -> &mut PhaseMachine {
        &mut self.machine
    }

    fn cue(&self, phase: Phase) -> Option<Cue> {
        match phase {
            Phase::Locking if self.fast => Some(Cue::DoorOpenFast),
            Phase::Locking => Some(Cue::DoorOpen),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.fast = false;
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::super::testing::Fixture;
    use super::super::{Device, DeviceSet};
    use super::*;
    use crate::env::Role;
    use crate::outcome::OutcomeTable;
    use crate::replication::ReplicationMessage;
    use crate::state::{HostileKey, Position};

    const ID: DeviceId = DeviceId(5);
    const VOLUME: VolumeId = VolumeId(50);

    fn devices() -> DeviceSet {
        let mut set = DeviceSet::new(Role::Authority);
        let door = Door::new(ID, VOLUME, DoorConfig::default().timings);
        set.insert(Device::Door(door)).unwrap();
        set
    }

    fn hostile(fixture: &mut Fixture, handle: u64, key: &str, strength: f32, dead: bool) -> EntityHandle {
        fixture.world.add(
            handle,
            Position::ORIGIN,
            EntityKind::Hostile {
                key: HostileKey::new(key),
                dead,
                door_strength: strength,
            },
        )
    }

    fn lock_cue(messages: &[ReplicationMessage]) -> Option<Cue> {
        messages.iter().find_map(|msg| match msg {
            ReplicationMessage::PhaseChanged {
                phase: Phase::Locking,
                cue,
                ..
            } => *cue,
            _ => None,
        })
    }

    fn door_state(set: &DeviceSet) -> Option<DeviceMode> {
        set.get(ID).map(|d| d.mode())
    }

    #[test]
    fn qualifying_hostile_opens_door() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let h = hostile(&mut fixture, 1, "flowerman", 0.8, false);
        let mut set = devices();
        set.on_enter(VOLUME, h);
        let mut env = fixture.env();

        set.tick(Duration::from_millis(50), &mut env);
        assert_eq!(set.get(ID).map(|d| d.phase()), Some(Phase::Locking));
        set.tick(Duration::from_secs(3), &mut env);
        assert_eq!(door_state(&set), Some(DeviceMode::Door(DoorState::Open)));
        assert_eq!(lock_cue(&set.drain_outbox()), Some(Cue::DoorOpen));
    }

    #[test]
    fn door_opens_when_the_cycle_is_accepted() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let h = hostile(&mut fixture, 1, "flowerman", 0.8, false);
        let mut set = devices();
        set.on_enter(VOLUME, h);
        let mut env = fixture.env();

        set.tick(Duration::ZERO, &mut env);
        assert_eq!(set.get(ID).map(|d| d.phase()), Some(Phase::Locking));
        assert_eq!(door_state(&set), Some(DeviceMode::Door(DoorState::Open)));
        assert!(matches!(
            set.drain_outbox().as_slice(),
            [
                ReplicationMessage::PhaseChanged { phase: Phase::Locking, .. },
                ReplicationMessage::ModeChanged { mode: DeviceMode::Door(DoorState::Open), cue: None, .. },
            ]
        ));

        // Nothing else changes state for the rest of the cycle.
        set.tick(Duration::from_secs(5), &mut env);
        assert!(
            set.drain_outbox()
                .iter()
                .all(|msg| matches!(msg, ReplicationMessage::PhaseChanged { .. }))
        );
    }

    #[test]
    fn strength_override_selects_fast_open() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let slow = hostile(&mut fixture, 1, "flowerman", 0.8, false);
        let crawler = hostile(&mut fixture, 2, "Crawler", 0.1, false);
        let mut set = devices();
        set.on_enter(VOLUME, slow);
        set.on_enter(VOLUME, crawler);
        let mut env = fixture.env();

        set.tick(Duration::ZERO, &mut env);
        set.tick(Duration::from_millis(500), &mut env);
        assert_eq!(set.get(ID).map(|d| d.phase()), Some(Phase::Dwelling));
        assert_eq!(lock_cue(&set.drain_outbox()), Some(Cue::DoorOpenFast));
    }

    #[test]
    fn dead_and_weak_hostiles_are_ignored() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let dead = hostile(&mut fixture, 1, "crawler", 3.0, true);
        let weak = hostile(&mut fixture, 2, "hoarderbug", 0.0, false);
        let player = fixture
            .world
            .add(3, Position::ORIGIN, EntityKind::Player { cosmetic: 0 });
        let mut set = devices();
        for handle in [dead, weak, player, EntityHandle(99)] {
            set.on_enter(VOLUME, handle);
        }
        let mut env = fixture.env();
        set.tick(Duration::from_secs(5), &mut env);
        assert_eq!(set.get(ID).map(|d| d.phase()), Some(Phase::Idle));
        assert!(set.drain_outbox().is_empty());
    }

    #[test]
    fn door_never_closes_itself_and_manual_close_is_immediate() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let h = hostile(&mut fixture, 1, "flowerman", 0.8, false);
        let mut set = devices();
        set.on_enter(VOLUME, h);
        let mut env = fixture.env();
        set.tick(Duration::from_secs(5), &mut env);
        set.tick(Duration::from_secs(60), &mut env);
        assert_eq!(door_state(&set), Some(DeviceMode::Door(DoorState::Open)));
        set.drain_outbox();

        assert_eq!(set.request_activate(ID, &mut env), Ok(Ack::Applied));
        assert_eq!(door_state(&set), Some(DeviceMode::Door(DoorState::Closed)));
        assert!(matches!(
            set.drain_outbox().as_slice(),
            [ReplicationMessage::ModeChanged { cue: Some(Cue::DoorClose), .. }]
        ));
    }

    #[test]
    fn manual_toggle_rejected_while_busy() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let mut set = devices();
        let mut env = fixture.env();
        assert_eq!(set.request_activate(ID, &mut env), Ok(Ack::Started { nonce: 1 }));
        assert_eq!(door_state(&set), Some(DeviceMode::Door(DoorState::Open)));
        assert_eq!(set.request_activate(ID, &mut env), Ok(Ack::Dropped));
    }
}
