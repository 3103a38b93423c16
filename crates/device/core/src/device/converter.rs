use tracing::{debug, info};

use super::{Ack, ActivationRecord, DeviceCtx, TimedDevice, broadcast_phase, live_views};
use crate::config::PhaseTimings;
use crate::error::DependencyError;
use crate::phase::{Activation, Phase, PhaseMachine};
use crate::replication::{Cue, Outbox};
use crate::state::{ConverterSetting, DeviceId, DeviceMode, EntityKind, Region, VolumeId};
use crate::transform::EntityTransformer;

/// Matter-transformation chamber with a five-position dial.
#[derive(Clone, Debug)]
pub struct Converter {
    pub(super) id: DeviceId,
    pub(super) chamber: VolumeId,
    output: Region,
    setting: ConverterSetting,
    pub(super) machine: PhaseMachine,
    record: Option<ActivationRecord>,
}

impl Converter {
    pub fn new(id: DeviceId, chamber: VolumeId, output: Region, timings: PhaseTimings) -> Self {
        Self {
            id,
            chamber,
            output,
            setting: ConverterSetting::default(),
            machine: PhaseMachine::new(timings),
            record: None,
        }
    }

    #[must_use]
    pub fn with_setting(mut self, setting: ConverterSetting) -> Self {
        self.setting = setting;
        self
    }

    pub fn setting(&self) -> ConverterSetting {
        self.setting
    }

    pub(super) fn request_activate(&mut self, outbox: &mut Outbox) -> Ack {
        match self.machine.request_activation() {
            Activation::Accepted { nonce } => {
                info!(target: "device::converter", device = %self.id, setting = %self.setting, nonce, "cycle started");
                broadcast_phase(self, Phase::Locking, outbox);
                Ack::Started { nonce }
            }
            Activation::Dropped => Ack::Dropped,
        }
    }

    /// Turns the dial one position. Controls are disabled while busy.
    pub(super) fn advance_setting(&mut self, outbox: &mut Outbox) -> Ack {
        if self.machine.is_busy() || self.machine.phase() != Phase::Idle {
            return Ack::Dropped;
        }
        self.setting = self.setting.next();
        debug!(target: "device::converter", device = %self.id, setting = %self.setting, "dial turned");
        outbox.mode_changed(self.id, self.mode(), Some(Cue::DialTurn));
        Ack::Applied
    }

    fn resolve(&mut self, ctx: &mut DeviceCtx<'_, '_>) -> Result<(), DependencyError> {
        let snapshot = ctx.tracker.snapshot(self.chamber)?;
        let container = ctx
            .env
            .world
            .props_container()
            .ok_or(DependencyError::PropsContainer)?;
        let views = live_views(self.id, &snapshot, &*ctx.env.world);

        let nonce = self.machine.nonce();
        let mut transformer = EntityTransformer::new(ctx.env, self.output, container, nonce);
        let mut entries = Vec::with_capacity(views.len());
        for view in views {
            match &view.kind {
                EntityKind::Object { held: true, .. } => {
                    debug!(target: "device::converter", handle = %view.handle, "held object left in place");
                }
                EntityKind::Player { cosmetic } => {
                    entries.push(transformer.convert_player(view.handle, *cosmetic, self.setting));
                }
                kind => {
                    if let Some(identity) = kind.identity() {
                        entries.extend(transformer.convert(view.handle, &identity, self.setting));
                    }
                }
            }
        }

        // Converted, destroyed and relocated subjects are no longer inside.
        for entry in &entries {
            ctx.tracker.evict(entry.subject());
        }

        info!(target: "device::converter", device = %self.id, nonce, occupants = snapshot.len(), outcomes = entries.len(), "resolved");
        self.record = Some(ActivationRecord {
            nonce,
            snapshot,
            entries,
        });
        Ok(())
    }

    fn announce(&mut self, outbox: &mut Outbox) {
        let record = self.record.take().unwrap_or_default();
        outbox.batch(
            self.id,
            record.nonce,
            self.mode(),
            self.setting.charges_batteries(),
            record.entries,
        );
    }
}

impl TimedDevice for Converter {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn mode(&self) -> DeviceMode {
        DeviceMode::Converter(self.setting)
    }

    fn machine(&mut self) -> &mut PhaseMachine {
        &mut self.machine
    }

    fn cue(&self, phase: Phase) -> Option<Cue> {
        (phase == Phase::Dwelling).then_some(Cue::ConverterRefine)
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

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::super::testing::Fixture;
    use super::super::{Device, DeviceSet};
    use super::*;
    use crate::env::Role;
    use crate::outcome::{Candidate, OutcomeTable};
    use crate::replication::{OutcomeEntry, ReplicationMessage};
    use crate::state::{EntityHandle, Identity, ItemKey, Position};
    use crate::transform::PlayerEffect;

    const ID: DeviceId = DeviceId(1);
    const CHAMBER: VolumeId = VolumeId(10);

    fn output() -> Region {
        Region::new(Position::new(10.0, 2.0, 10.0), Position::new(1.0, 2.0, 1.5))
    }

    fn devices(setting: ConverterSetting) -> DeviceSet {
        let mut set = DeviceSet::new(Role::Authority);
        let converter =
            Converter::new(ID, CHAMBER, output(), PhaseTimings::new(2.0, 5.0, 7.0)).with_setting(setting);
        set.insert(Device::Converter(converter)).unwrap();
        set
    }

    fn object(fixture: &mut Fixture, handle: u64, key: &str) -> EntityHandle {
        fixture.world.add(
            handle,
            Position::ORIGIN,
            EntityKind::Object {
                key: ItemKey::new(key),
                held: false,
                floor_position: Position::ORIGIN,
            },
        )
    }

    fn batch_entries(messages: &[ReplicationMessage]) -> Vec<OutcomeEntry> {
        messages
            .iter()
            .find_map(|msg| match msg {
                ReplicationMessage::OutcomeBatch(batch) => Some(batch.entries.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    #[test]
    fn same_sentinel_replaces_with_fresh_instance() {
        let mut table = OutcomeTable::new();
        table.add(Identity::object("a"), ConverterSetting::OneToOne, [Candidate::Same]);
        let mut fixture = Fixture::new(table);
        let a = object(&mut fixture, 1, "A");

        let mut set = devices(ConverterSetting::OneToOne);
        set.on_enter(CHAMBER, a);
        let mut env = fixture.env();
        assert_eq!(set.request_activate(ID, &mut env), Ok(Ack::Started { nonce: 1 }));
        assert!(set.tick(Duration::from_secs(20), &mut env).is_empty());
        drop(env);

        let entries = batch_entries(&set.drain_outbox());
        let [OutcomeEntry::Spawned { source, instance, identity, .. }] = entries.as_slice() else {
            panic!("expected one spawn, got {entries:?}");
        };
        assert_eq!(*source, a);
        assert_eq!(identity, &Identity::object("a"));
        assert!(!fixture.world.entities.contains_key(&a));
        assert!(fixture.world.entities.contains_key(instance));
        assert!(!set.tracker().snapshot(CHAMBER).unwrap().contains(a));
    }

    #[test]
    fn phases_are_broadcast_in_order_with_batch_before_unlock() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let d = object(&mut fixture, 1, "d");
        let mut set = devices(ConverterSetting::Rough);
        set.on_enter(CHAMBER, d);
        let mut env = fixture.env();
        set.request_activate(ID, &mut env).unwrap();
        set.tick(Duration::from_secs(20), &mut env);

        let kinds: Vec<String> = set
            .drain_outbox()
            .iter()
            .map(|msg| match msg {
                ReplicationMessage::PhaseChanged { phase, .. } => phase.to_string(),
                ReplicationMessage::OutcomeBatch(_) => "batch".to_owned(),
                ReplicationMessage::ModeChanged { .. } => "mode".to_owned(),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "locking",
                "dwelling",
                "resolving",
                "announcing",
                "batch",
                "unlocking",
                "idle"
            ]
        );
    }

    #[test]
    fn held_objects_are_skipped() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let held = fixture.world.add(
            1,
            Position::ORIGIN,
            EntityKind::Object {
                key: ItemKey::new("a"),
                held: true,
                floor_position: Position::ORIGIN,
            },
        );
        let mut set = devices(ConverterSetting::Rough);
        set.on_enter(CHAMBER, held);
        let mut env = fixture.env();
        set.request_activate(ID, &mut env).unwrap();
        set.tick(Duration::from_secs(20), &mut env);
        drop(env);
        assert!(batch_entries(&set.drain_outbox()).is_empty());
        assert!(fixture.world.entities.contains_key(&held));
    }

    #[test]
    fn coarse_damages_players() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let player = fixture
            .world
            .add(5, Position::ORIGIN, EntityKind::Player { cosmetic: 0 });
        let mut set = devices(ConverterSetting::Coarse);
        set.on_enter(CHAMBER, player);
        let mut env = fixture.env();
        set.request_activate(ID, &mut env).unwrap();
        set.tick(Duration::from_secs(20), &mut env);

        let entries = batch_entries(&set.drain_outbox());
        assert!(matches!(
            entries.as_slice(),
            [OutcomeEntry::Player { effect: Some(PlayerEffect::Damage(50)), relocate, .. }]
                if (relocate.y - 1.0).abs() < 1e-4
        ));
    }

    #[test]
    fn relocated_players_leave_the_chamber() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let player = fixture
            .world
            .add(5, Position::ORIGIN, EntityKind::Player { cosmetic: 0 });
        let mut set = devices(ConverterSetting::Coarse);
        set.on_enter(CHAMBER, player);
        let mut env = fixture.env();
        set.request_activate(ID, &mut env).unwrap();
        set.tick(Duration::from_secs(20), &mut env);
        assert_eq!(batch_entries(&set.drain_outbox()).len(), 1);
        assert!(!set.tracker().snapshot(CHAMBER).unwrap().contains(player));

        set.request_activate(ID, &mut env).unwrap();
        set.tick(Duration::from_secs(20), &mut env);
        assert!(batch_entries(&set.drain_outbox()).is_empty());
    }

    #[test]
    fn very_fine_respects_death_rules() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        fixture.session.death_allowed = false;
        let player = fixture
            .world
            .add(5, Position::ORIGIN, EntityKind::Player { cosmetic: 1 });
        let mut set = devices(ConverterSetting::VeryFine);
        set.on_enter(CHAMBER, player);
        let mut env = fixture.env();
        set.request_activate(ID, &mut env).unwrap();
        set.tick(Duration::from_secs(20), &mut env);
        assert!(matches!(
            batch_entries(&set.drain_outbox()).as_slice(),
            [OutcomeEntry::Player { effect: None, .. }]
        ));

        fixture.session.death_allowed = true;
        set.on_enter(CHAMBER, player);
        let mut env = fixture.env();
        set.request_activate(ID, &mut env).unwrap();
        set.tick(Duration::from_secs(20), &mut env);
        assert!(matches!(
            batch_entries(&set.drain_outbox()).as_slice(),
            [OutcomeEntry::Player { effect: Some(PlayerEffect::Mimic { cosmetic: 1, .. }), .. }]
        ));
    }

    #[test]
    fn mimic_missing_from_catalog_falls_back_to_kill() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        fixture.config.converter.mimic = "doppelganger".to_owned();
        let player = fixture
            .world
            .add(5, Position::ORIGIN, EntityKind::Player { cosmetic: 1 });
        let mut set = devices(ConverterSetting::VeryFine);
        set.on_enter(CHAMBER, player);
        let mut env = fixture.env();
        set.request_activate(ID, &mut env).unwrap();
        let diagnostics = set.tick(Duration::from_secs(20), &mut env);
        drop(env);

        assert!(diagnostics.is_empty(), "a catalog gap never aborts the cycle");
        assert!(matches!(
            batch_entries(&set.drain_outbox()).as_slice(),
            [OutcomeEntry::Player { effect: Some(PlayerEffect::Kill), .. }]
        ));
        assert_eq!(fixture.world.next, 1000, "nothing was spawned");
        assert_eq!(set.get(ID).map(|d| d.phase()), Some(Phase::Idle));
    }

    #[test]
    fn cosmetic_never_repeats_current() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let player = fixture
            .world
            .add(5, Position::ORIGIN, EntityKind::Player { cosmetic: 2 });
        let mut set = devices(ConverterSetting::OneToOne);
        for _ in 0..10 {
            set.on_enter(CHAMBER, player);
            let mut env = fixture.env();
            set.request_activate(ID, &mut env).unwrap();
            set.tick(Duration::from_secs(20), &mut env);
            let entries = batch_entries(&set.drain_outbox());
            assert!(matches!(
                entries.as_slice(),
                [OutcomeEntry::Player { effect: Some(PlayerEffect::Cosmetic(id)), .. }] if *id != 2
            ));
        }
    }

    #[test]
    fn missing_props_container_aborts_to_idle() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        fixture.world.container = None;
        let d = object(&mut fixture, 1, "d");
        let mut set = devices(ConverterSetting::Rough);
        set.on_enter(CHAMBER, d);
        let mut env = fixture.env();
        set.request_activate(ID, &mut env).unwrap();
        let diagnostics = set.tick(Duration::from_secs(20), &mut env);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "DEPENDENCY_PROPS_CONTAINER");
        let device = set.get(ID).unwrap();
        assert_eq!(device.phase(), Phase::Idle);
        assert!(!device.is_busy());
        assert!(matches!(
            set.drain_outbox().last(),
            Some(ReplicationMessage::PhaseChanged { phase: Phase::Idle, .. })
        ));
        assert_eq!(set.request_activate(ID, &mut env), Ok(Ack::Started { nonce: 2 }));
    }

    #[test]
    fn dial_is_locked_while_busy() {
        let mut fixture = Fixture::new(OutcomeTable::new());
        let mut set = devices(ConverterSetting::Rough);
        assert_eq!(set.request_mode_advance(ID), Ok(Ack::Applied));
        let mut env = fixture.env();
        set.request_activate(ID, &mut env).unwrap();
        assert_eq!(set.request_mode_advance(ID), Ok(Ack::Dropped));
        assert_eq!(
            set.get(ID).map(|d| d.mode()),
            Some(DeviceMode::Converter(ConverterSetting::Coarse))
        );
    }
}
