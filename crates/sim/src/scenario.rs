//! Scripted session exercising every device kind.
//!
//! The host world holds a converter chamber on the upper floor, a lift
//! between the two floors and a powered door. A follower joins before
//! anything happens and must end up with the same world as the host.
use anyhow::{Context, Result, ensure};
use device_content::ContentBundle;
use device_core::{
    Ack, Converter, ConverterSetting, DeviceId, DeviceMode, Door, DoorState, Lift, Phase,
    Position, Region, SessionContext, VolumeId,
};
use runtime::{
    DeviceStatus, Event, FollowerHandle, InMemoryWorld, Runtime, RuntimeHandle, Topic,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::SimConfig;

const CONVERTER: DeviceId = DeviceId(1);
const CHAMBER: VolumeId = VolumeId(10);
const LIFT: DeviceId = DeviceId(2);
const LIFT_TOP: VolumeId = VolumeId(20);
const LIFT_BOTTOM: VolumeId = VolumeId(21);
const DOOR: DeviceId = DeviceId(3);
const DOORWAY: VolumeId = VolumeId(30);

const UPPER_FLOOR: f32 = 0.0;

fn output_region() -> Region {
    Region::new(Position::new(6.0, 1.0, 0.0), Position::new(1.5, 2.0, 1.5))
}

pub async fn run(config: &SimConfig, bundle: ContentBundle) -> Result<()> {
    let device_config = bundle.config.clone();
    let lower_floor = UPPER_FLOOR - device_config.lift.offset;
    let mut world = InMemoryWorld::new().with_floors([UPPER_FLOOR, lower_floor]);
    let chamber = Position::new(0.0, UPPER_FLOOR, 0.0);
    let loot = ["airhorn", "flashlight", "bolt"].map(|key| world.add_object(key, chamber));
    let player = world.add_player(0, Position::new(20.0, UPPER_FLOOR, 0.0));
    let bug = world.add_hostile("hoarding bug", Position::new(-10.0, UPPER_FLOOR, 0.0), 1.0);

    let session = SessionContext::authority(config.seed)
        .with_value_multiplier(device_config.value_multiplier)
        .with_cosmetics(0..4);
    info!(seed = config.seed, "starting session");

    let runtime = Runtime::builder()
        .config(config.runtime.clone())
        .session(session)
        .world(world)
        .device(Converter::new(
            CONVERTER,
            CHAMBER,
            output_region(),
            device_config.converter.timings,
        ))
        .device(Lift::new(LIFT, LIFT_TOP, LIFT_BOTTOM, device_config.lift.timings))
        .device(Door::new(DOOR, DOORWAY, device_config.door.timings))
        .content(bundle)
        .build()
        .await?;
    let handle = runtime.handle();
    let monitor = spawn_monitor(&runtime);
    let follower = handle.join().await?;

    // Converter: dial to fine, load the chamber, run one cycle.
    let fine = DeviceMode::Converter(ConverterSetting::Fine);
    while handle.device(CONVERTER).await?.map(|status| status.mode) != Some(fine) {
        handle.advance_mode(CONVERTER).await?;
    }
    for item in loot {
        handle.enter(CHAMBER, item).await?;
    }
    expect_started(handle.activate(CONVERTER).await?, "converter")?;
    wait_for(&handle, CONVERTER, config, is_idle).await?;

    // Lift: the player rides down.
    handle.enter(LIFT_TOP, player).await?;
    expect_started(handle.activate(LIFT).await?, "lift")?;
    wait_for(&handle, LIFT, config, is_idle).await?;

    // Door: a hostile wanders into the doorway.
    handle.enter(DOORWAY, bug).await?;
    wait_for(&handle, DOOR, config, |status| {
        status.mode == DeviceMode::Door(DoorState::Open) && is_idle(status)
    })
    .await?;

    let host = handle.world().await?;
    compare_with(&follower, &host).await?;
    for record in host.records() {
        info!(
            handle = %record.handle,
            identity = ?record.identity(),
            position = ?record.position,
            value = ?record.value,
            charged = ?record.charged,
            "entity"
        );
    }
    for status in handle.devices().await? {
        info!(device = %status.id, mode = ?status.mode, "device");
    }

    follower.leave().await?;
    runtime.shutdown().await?;
    monitor.abort();
    Ok(())
}

fn expect_started(ack: Ack, device: &str) -> Result<()> {
    ensure!(
        matches!(ack, Ack::Started { .. }),
        "{device} did not start: {ack:?}"
    );
    Ok(())
}

fn is_idle(status: &DeviceStatus) -> bool {
    !status.busy && status.phase == Phase::Idle
}

/// Polls the device once per tick until `done` holds.
async fn wait_for(
    handle: &RuntimeHandle,
    device: DeviceId,
    config: &SimConfig,
    done: impl Fn(&DeviceStatus) -> bool,
) -> Result<()> {
    let mut ticker = tokio::time::interval(config.runtime.tick_interval);
    loop {
        ticker.tick().await;
        let status = handle
            .device(device)
            .await?
            .with_context(|| format!("device {device} disappeared"))?;
        if done(&status) {
            return Ok(());
        }
    }
}

async fn compare_with(follower: &FollowerHandle, host: &InMemoryWorld) -> Result<()> {
    let mirror = follower.world().await?;
    let diverged = host
        .records()
        .zip(mirror.records())
        .filter(|(ours, theirs)| ours != theirs)
        .count();
    ensure!(
        diverged == 0 && host.len() == mirror.len(),
        "{} diverged from the authority ({diverged} entities differ)",
        follower.participant()
    );
    info!(participant = %follower.participant(), entities = host.len(), "follower in sync");
    Ok(())
}

/// Logs diagnostics and the cues every participant would play.
fn spawn_monitor(runtime: &Runtime) -> JoinHandle<()> {
    let mut diagnostics = runtime.subscribe(Topic::Diagnostic);
    let mut presentation = runtime.subscribe(Topic::Presentation);
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                event = diagnostics.recv() => event,
                event = presentation.recv() => event,
            };
            match event {
                Ok(Event::Diagnostic(diagnostic)) => {
                    warn!(device = %diagnostic.device, code = %diagnostic.code, "{}", diagnostic.message);
                }
                Ok(Event::Lagged(lag)) => {
                    warn!(participant = %lag.participant, skipped = lag.skipped, "follower resynchronized");
                }
                Ok(Event::Presentation(event)) => {
                    info!(participant = %event.participant, device = %event.device, intent = ?event.intent, "present");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "monitor lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
