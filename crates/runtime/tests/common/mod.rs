//! Shared fixtures for runtime integration tests.
#![allow(dead_code)]

use std::time::Duration;

use device_core::{
    Candidate, Converter, ConverterSetting, DeviceConfig, DeviceId, Door, HostileDefinition,
    Identity, ItemDefinition, Lift, OutcomeTable, Position, Region, ReplicationMessage,
    StaticCatalog, VolumeId,
};
use runtime::{Event, InMemoryWorld, Runtime, RuntimeBuilder};
use tokio::sync::broadcast;

pub const CONVERTER: DeviceId = DeviceId(1);
pub const CHAMBER: VolumeId = VolumeId(10);

pub const LIFT: DeviceId = DeviceId(2);
pub const LIFT_TOP: VolumeId = VolumeId(20);
pub const LIFT_BOTTOM: VolumeId = VolumeId(21);

pub const DOOR: DeviceId = DeviceId(3);
pub const DOORWAY: VolumeId = VolumeId(30);

pub const INSIDE: Position = Position::new(0.0, 0.0, 0.0);
pub const OUTPUT: Region = Region::new(Position::new(10.0, 1.0, 0.0), Position::new(1.0, 2.0, 1.0));

/// Longer than any full cycle under the default timings.
pub const SETTLE: Duration = Duration::from_secs(30);

pub fn catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_item(ItemDefinition::new("a").with_value(10, 20))
        .with_item(ItemDefinition::new("b").with_value(10, 20))
        .with_item(ItemDefinition::new("c").with_value(40, 60))
        .with_item(ItemDefinition::new("d").with_value(30, 90))
        .with_item(ItemDefinition::new("flashlight").with_value(5, 10).with_battery())
        .with_hostile(HostileDefinition::new("masked"))
        .with_hostile(HostileDefinition::new("crawler"))
}

/// `a` is recreated 1:1 and `b` is scrapped or refined into `c` on rough.
pub fn table() -> OutcomeTable {
    let mut table = OutcomeTable::new();
    table.add(
        Identity::object("a"),
        ConverterSetting::OneToOne,
        [Candidate::Same],
    );
    table.add(
        Identity::object("b"),
        ConverterSetting::Rough,
        [
            Candidate::Destroy,
            Candidate::Destroy,
            Candidate::Become(Identity::object("c")),
        ],
    );
    table
}

/// Converter, lift (at its top stop) and a closed door over default tunables.
pub fn builder(world: InMemoryWorld, setting: ConverterSetting) -> RuntimeBuilder {
    let config = DeviceConfig::default();
    Runtime::builder()
        .catalog(catalog())
        .table(table())
        .world(world)
        .device(Converter::new(CONVERTER, CHAMBER, OUTPUT, config.converter.timings).with_setting(setting))
        .device(Lift::new(LIFT, LIFT_TOP, LIFT_BOTTOM, config.lift.timings))
        .device(Door::new(DOOR, DOORWAY, config.door.timings))
        .device_config(config)
}

pub async fn start(world: InMemoryWorld, setting: ConverterSetting) -> Runtime {
    builder(world, setting)
        .build()
        .await
        .expect("runtime should start")
}

/// Decodes every replication frame received so far.
pub fn drain_messages(rx: &mut broadcast::Receiver<Event>) -> Vec<ReplicationMessage> {
    let mut messages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::Replication(frame) = event {
            messages.push(frame.message().expect("frame should decode"));
        }
    }
    messages
}

/// Drains every event received so far.
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
