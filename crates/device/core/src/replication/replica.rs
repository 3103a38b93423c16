use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{Cue, OutcomeBatch, OutcomeEntry, ReplicationMessage};
use crate::env::Catalog;
use crate::error::{DeviceFault, ReplicaError};
use crate::phase::Phase;
use crate::state::{DeviceId, DeviceMode, EntityHandle, Identity, Position};
use crate::transform::PlayerEffect;

/// Participant-local world as seen by the replica.
///
/// Operations on a handle that no longer resolves return
/// [`ReplicaError::TargetExpired`]; the replica skips that single effect.
pub trait ReplicaWorld {
    fn contains(&self, handle: EntityHandle) -> bool;

    /// Makes `handle` exist locally. No-op if it already does.
    fn materialize(&mut self, handle: EntityHandle, identity: &Identity, at: Position);

    /// Returns `false` if the entity was already gone.
    fn remove(&mut self, handle: EntityHandle) -> bool;

    fn set_value(&mut self, handle: EntityHandle, value: u32) -> Result<(), ReplicaError>;

    fn set_charge(&mut self, handle: EntityHandle, full: bool) -> Result<(), ReplicaError>;

    fn teleport(&mut self, handle: EntityHandle, to: Position) -> Result<(), ReplicaError>;

    fn apply_player_effect(
        &mut self,
        player: EntityHandle,
        effect: &PlayerEffect,
    ) -> Result<(), ReplicaError>;
}

/// What the local presentation layer should do after a message.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PresentationIntent {
    /// Enable or disable the device's interactive controls.
    Controls(bool),
    /// Open or close the device's doors.
    Doors(bool),
    ShowPhase(Phase),
    ShowMode(DeviceMode),
    Cue(Cue),
    /// Toggle the navigation obstacle carved by a closed door.
    NavObstacle(bool),
}

/// Follower-side copy of a device, updated only through replication.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceShadow {
    pub mode: DeviceMode,
    pub phase: Phase,
    pub last_seq: u64,
}

impl DeviceShadow {
    pub fn new(mode: DeviceMode) -> Self {
        Self {
            mode,
            phase: Phase::Idle,
            last_seq: 0,
        }
    }
}

/// Outcome of applying one message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApplyReport {
    /// The message was at or below the last applied sequence.
    pub duplicate: bool,
    pub applied: usize,
    /// Effects skipped because their target no longer resolved.
    pub skipped: usize,
    pub intents: Vec<PresentationIntent>,
}

/// Idempotent applier of replication messages.
#[derive(Clone, Debug, Default)]
pub struct Replica {
    shadows: BTreeMap<DeviceId, DeviceShadow>,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, device: DeviceId, mode: DeviceMode) {
        self.shadows.insert(device, DeviceShadow::new(mode));
    }

    pub fn shadow(&self, device: DeviceId) -> Option<&DeviceShadow> {
        self.shadows.get(&device)
    }

    pub fn shadows(&self) -> impl Iterator<Item = (DeviceId, &DeviceShadow)> {
        self.shadows.iter().map(|(id, shadow)| (*id, shadow))
    }

    /// Applies `message` once. Messages at or below the device's last
    /// applied sequence are reported as duplicates and change nothing.
    pub fn apply(
        &mut self,
        message: &ReplicationMessage,
        world: &mut dyn ReplicaWorld,
        catalog: &dyn Catalog,
    ) -> Result<ApplyReport, ReplicaError> {
        let device = message.device();
        let shadow = self
            .shadows
            .get_mut(&device)
            .ok_or(ReplicaError::UnknownDevice(device))?;

        let seq = message.seq();
        if seq <= shadow.last_seq {
            debug!(target: "device::replica", %device, seq, last = shadow.last_seq, "duplicate message ignored");
            return Ok(ApplyReport {
                duplicate: true,
                ..ApplyReport::default()
            });
        }
        shadow.last_seq = seq;

        let mut report = ApplyReport::default();
        match message {
            ReplicationMessage::PhaseChanged {
                phase, mode, cue, ..
            } => {
                shadow.phase = *phase;
                shadow.mode = *mode;
                report.intents = phase_intents(*phase, *mode, *cue);
            }
            ReplicationMessage::ModeChanged { mode, cue, .. } => {
                shadow.mode = *mode;
                report.intents = mode_intents(*mode, *cue);
            }
            ReplicationMessage::OutcomeBatch(batch) => {
                shadow.mode = batch.mode;
                apply_batch(batch, world, catalog, &mut report);
            }
        }
        Ok(report)
    }
}

fn phase_intents(phase: Phase, mode: DeviceMode, cue: Option<Cue>) -> Vec<PresentationIntent> {
    let mut intents = vec![
        PresentationIntent::ShowPhase(phase),
        PresentationIntent::Controls(phase.controls_enabled()),
    ];
    // Converter and lift doors follow the cycle; powered doors follow their mode.
    if !matches!(mode, DeviceMode::Door(_)) {
        match phase {
            Phase::Locking => intents.push(PresentationIntent::Doors(false)),
            Phase::Unlocking => intents.push(PresentationIntent::Doors(true)),
            _ => {}
        }
    }
    intents.extend(cue.map(PresentationIntent::Cue));
    intents
}

fn mode_intents(mode: DeviceMode, cue: Option<Cue>) -> Vec<PresentationIntent> {
    let mut intents = vec![PresentationIntent::ShowMode(mode)];
    if let DeviceMode::Door(state) = mode {
        intents.push(PresentationIntent::Doors(state.is_open()));
        intents.push(PresentationIntent::NavObstacle(!state.is_open()));
    }
    intents.extend(cue.map(PresentationIntent::Cue));
    intents
}

fn apply_batch(
    batch: &OutcomeBatch,
    world: &mut dyn ReplicaWorld,
    catalog: &dyn Catalog,
    report: &mut ApplyReport,
) {
    for entry in &batch.entries {
        match apply_entry(entry, batch.battery_charged, world, catalog) {
            Ok(()) => report.applied += 1,
            Err(err) => {
                warn!(
                    target: "device::replica",
                    device = %batch.device,
                    subject = %entry.subject(),
                    code = err.error_code(),
                    %err,
                    "effect skipped"
                );
                report.skipped += 1;
            }
        }
    }
}

fn apply_entry(
    entry: &OutcomeEntry,
    battery_charged: bool,
    world: &mut dyn ReplicaWorld,
    catalog: &dyn Catalog,
) -> Result<(), ReplicaError> {
    match entry {
        OutcomeEntry::Spawned {
            source,
            instance,
            identity,
            position,
            value,
        } => {
            world.remove(*source);
            world.materialize(*instance, identity, *position);
            if let Some(value) = value {
                world.set_value(*instance, *value)?;
            }
            if let Identity::Object(key) = identity
                && catalog.item(key).is_some_and(|def| def.requires_battery)
            {
                world.set_charge(*instance, battery_charged)?;
            }
            Ok(())
        }
        OutcomeEntry::Destroyed { source } => {
            world.remove(*source);
            Ok(())
        }
        OutcomeEntry::Player {
            player,
            relocate,
            effect,
        } => {
            world.teleport(*player, *relocate)?;
            if let Some(PlayerEffect::Mimic { mimic, key, .. }) = effect {
                world.materialize(*mimic, &Identity::Hostile(key.clone()), *relocate);
            }
            match effect {
                Some(effect) => world.apply_player_effect(*player, effect),
                None => Ok(()),
            }
        }
        OutcomeEntry::Displaced { target, to, .. } => world.teleport(*target, *to),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::env::{ItemDefinition, StaticCatalog};
    use crate::state::{ConverterSetting, DoorState, EntityClass};

    #[derive(Default)]
    struct Recorder {
        entities: BTreeMap<EntityHandle, Position>,
        values: BTreeMap<EntityHandle, u32>,
        charges: BTreeMap<EntityHandle, bool>,
        effects: Vec<(EntityHandle, PlayerEffect)>,
    }

    impl Recorder {
        fn require(&self, handle: EntityHandle) -> Result<(), ReplicaError> {
            if self.entities.contains_key(&handle) {
                Ok(())
            } else {
                Err(ReplicaError::TargetExpired(handle))
            }
        }
    }

    impl ReplicaWorld for Recorder {
        fn contains(&self, handle: EntityHandle) -> bool {
            self.entities.contains_key(&handle)
        }

        fn materialize(&mut self, handle: EntityHandle, _identity: &Identity, at: Position) {
            self.entities.entry(handle).or_insert(at);
        }

        fn remove(&mut self, handle: EntityHandle) -> bool {
            self.entities.remove(&handle).is_some()
        }

        fn set_value(&mut self, handle: EntityHandle, value: u32) -> Result<(), ReplicaError> {
            self.require(handle)?;
            self.values.insert(handle, value);
            Ok(())
        }

        fn set_charge(&mut self, handle: EntityHandle, full: bool) -> Result<(), ReplicaError> {
            self.require(handle)?;
            self.charges.insert(handle, full);
            Ok(())
        }

        fn teleport(&mut self, handle: EntityHandle, to: Position) -> Result<(), ReplicaError> {
            self.require(handle)?;
            self.entities.insert(handle, to);
            Ok(())
        }

        fn apply_player_effect(
            &mut self,
            player: EntityHandle,
            effect: &PlayerEffect,
        ) -> Result<(), ReplicaError> {
            self.require(player)?;
            self.effects.push((player, effect.clone()));
            Ok(())
        }
    }

    const DEVICE: DeviceId = DeviceId(7);
    const MODE: DeviceMode = DeviceMode::Converter(ConverterSetting::Fine);

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_item(ItemDefinition::new("flashlight").with_battery())
            .with_item(ItemDefinition::new("bolt").with_value(10, 20))
    }

    fn replica() -> Replica {
        let mut replica = Replica::new();
        replica.register(DEVICE, MODE);
        replica
    }

    fn batch(seq: u64, entries: Vec<OutcomeEntry>) -> ReplicationMessage {
        ReplicationMessage::OutcomeBatch(OutcomeBatch {
            device: DEVICE,
            seq,
            activation: 1,
            mode: MODE,
            battery_charged: true,
            entries,
        })
    }

    #[test]
    fn reapplying_a_phase_change_is_a_no_op() {
        let mut replica = replica();
        let mut world = Recorder::default();
        let msg = ReplicationMessage::PhaseChanged {
            device: DEVICE,
            seq: 1,
            phase: Phase::Locking,
            mode: MODE,
            cue: None,
        };
        let first = replica.apply(&msg, &mut world, &catalog()).unwrap();
        assert!(first.intents.contains(&PresentationIntent::Controls(false)));
        let second = replica.apply(&msg, &mut world, &catalog()).unwrap();
        assert!(second.duplicate);
        assert!(second.intents.is_empty());
        assert_eq!(replica.shadow(DEVICE).map(|s| s.phase), Some(Phase::Locking));
    }

    #[test]
    fn batch_applies_values_and_charges_once() {
        let mut replica = replica();
        let mut world = Recorder::default();
        world.entities.insert(EntityHandle(1), Position::ORIGIN);
        let msg = batch(
            1,
            vec![
                OutcomeEntry::Spawned {
                    source: EntityHandle(1),
                    instance: EntityHandle(10),
                    identity: Identity::object("bolt"),
                    position: Position::new(1.0, 0.0, 1.0),
                    value: Some(12),
                },
                OutcomeEntry::Spawned {
                    source: EntityHandle(2),
                    instance: EntityHandle(11),
                    identity: Identity::object("flashlight"),
                    position: Position::ORIGIN,
                    value: None,
                },
            ],
        );
        let report = replica.apply(&msg, &mut world, &catalog()).unwrap();
        assert_eq!(report.applied, 2);
        assert!(!world.contains(EntityHandle(1)));
        assert_eq!(world.values.get(&EntityHandle(10)), Some(&12));
        assert_eq!(world.charges.get(&EntityHandle(11)), Some(&true));

        assert!(replica.apply(&msg, &mut world, &catalog()).unwrap().duplicate);
    }

    #[test]
    fn expired_target_skips_only_that_effect() {
        let mut replica = replica();
        let mut world = Recorder::default();
        world.entities.insert(EntityHandle(5), Position::ORIGIN);
        let msg = batch(
            1,
            vec![
                OutcomeEntry::Player {
                    player: EntityHandle(4),
                    relocate: Position::ORIGIN,
                    effect: Some(PlayerEffect::Kill),
                },
                OutcomeEntry::Player {
                    player: EntityHandle(5),
                    relocate: Position::ORIGIN,
                    effect: Some(PlayerEffect::Heal(50)),
                },
                OutcomeEntry::Displaced {
                    target: EntityHandle(6),
                    class: EntityClass::Object,
                    to: Position::ORIGIN,
                },
            ],
        );
        let report = replica.apply(&msg, &mut world, &catalog()).unwrap();
        assert_eq!((report.applied, report.skipped), (1, 2));
        assert_eq!(world.effects, vec![(EntityHandle(5), PlayerEffect::Heal(50))]);
    }

    #[test]
    fn door_mode_toggles_obstacle() {
        let mut replica = Replica::new();
        replica.register(DEVICE, DeviceMode::Door(DoorState::Closed));
        let msg = ReplicationMessage::ModeChanged {
            device: DEVICE,
            seq: 3,
            mode: DeviceMode::Door(DoorState::Open),
            cue: Some(Cue::DoorOpen),
        };
        let report = replica
            .apply(&msg, &mut Recorder::default(), &catalog())
            .unwrap();
        assert!(report.intents.contains(&PresentationIntent::Doors(true)));
        assert!(report.intents.contains(&PresentationIntent::NavObstacle(false)));
        assert!(report.intents.contains(&PresentationIntent::Cue(Cue::DoorOpen)));
    }

    #[test]
    fn unknown_device_is_rejected() {
        let mut replica = Replica::new();
        let msg = batch(1, Vec::new());
        assert_eq!(
            replica.apply(&msg, &mut Recorder::default(), &catalog()),
            Err(ReplicaError::UnknownDevice(DEVICE))
        );
    }
}
