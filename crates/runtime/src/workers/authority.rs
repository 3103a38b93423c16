//! Authority worker that owns the devices and the authoritative world.
//!
//! Receives commands from [`crate::RuntimeHandle`], advances every device on
//! a fixed scheduler tick, applies the resulting replication messages to the
//! host's own world through its replica, and publishes them as encoded
//! frames on the replication topic.

use std::sync::Arc;

use device_core::{
    Ack, AuthorityEnv, Catalog, DeviceConfig, DeviceId, DeviceSet, Diagnostic, EntityHandle,
    OutcomeTable, PcgRng, Replica, ReplicationMessage, SessionContext, VolumeId, World,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::{DeviceStatus, Result};
use crate::events::{Event, EventBus, ParticipantId, PresentationEvent, Topic};
use crate::wire::ReplicationFrame;
use crate::world::InMemoryWorld;

/// Host-local mutation of the authoritative world.
pub(crate) type WorldEdit = Box<dyn FnOnce(&mut InMemoryWorld) + Send>;

/// What a joining participant starts from.
pub(crate) struct JoinSnapshot {
    pub participant: ParticipantId,
    pub world: InMemoryWorld,
    pub replica: Replica,
    pub catalog: Arc<dyn Catalog>,
    pub frames: broadcast::Receiver<Event>,
    pub command_buffer_size: usize,
}

/// Commands that can be sent to the authority worker
pub(crate) enum Command {
    /// Trigger-volume enter event from the host's physics.
    Enter {
        volume: VolumeId,
        handle: EntityHandle,
        reply: oneshot::Sender<bool>,
    },
    /// Trigger-volume exit event from the host's physics.
    Exit {
        volume: VolumeId,
        handle: EntityHandle,
        reply: oneshot::Sender<bool>,
    },
    /// Advisory activation request from any participant.
    Activate {
        device: DeviceId,
        reply: oneshot::Sender<Result<Ack>>,
    },
    /// Advisory mode-advance request from any participant.
    AdvanceMode {
        device: DeviceId,
        reply: oneshot::Sender<Result<Ack>>,
    },
    /// Destroys an entity outside of any device and forgets it everywhere.
    Despawn {
        handle: EntityHandle,
        reply: oneshot::Sender<bool>,
    },
    EditWorld {
        edit: WorldEdit,
    },
    QueryDevices {
        reply: oneshot::Sender<Vec<DeviceStatus>>,
    },
    QueryWorld {
        reply: oneshot::Sender<InMemoryWorld>,
    },
    Join {
        reply: oneshot::Sender<JoinSnapshot>,
    },
    /// Fresh snapshot for a follower that fell behind.
    Resync {
        participant: ParticipantId,
        reply: oneshot::Sender<JoinSnapshot>,
    },
    Shutdown,
}

/// Read-only content the authority resolves against.
pub(crate) struct AuthorityContent {
    pub catalog: Arc<dyn Catalog>,
    pub table: OutcomeTable,
    pub config: DeviceConfig,
    pub session: SessionContext,
}

/// Background task that owns every device and the authoritative world.
pub(crate) struct AuthorityWorker {
    devices: DeviceSet,
    world: InMemoryWorld,
    replica: Replica,
    content: AuthorityContent,
    rng: PcgRng,
    tick_interval: Duration,
    command_buffer_size: usize,
    next_participant: u32,
    command_rx: mpsc::Receiver<Command>,
    event_bus: EventBus,
}

impl AuthorityWorker {
    pub fn new(
        devices: DeviceSet,
        world: InMemoryWorld,
        content: AuthorityContent,
        tick_interval: Duration,
        command_buffer_size: usize,
        command_rx: mpsc::Receiver<Command>,
        event_bus: EventBus,
    ) -> Self {
        let mut replica = Replica::new();
        for device in devices.iter() {
            replica.register(device.id(), device.mode());
        }
        info!(
            target: "runtime::authority",
            devices = devices.iter().count(),
            entities = world.len(),
            seed = content.session.seed,
            "authority worker initialized"
        );

        Self {
            devices,
            world,
            replica,
            content,
            rng: PcgRng,
            tick_interval,
            command_buffer_size,
            next_participant: 1,
            command_rx,
            event_bus,
        }
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        let mut ticker = time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(Command::Shutdown) | None => {
                            debug!(target: "runtime::authority", "command channel closed");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                now = ticker.tick() => {
                    let elapsed = now.saturating_duration_since(last_tick);
                    last_tick = now;
                    self.tick(elapsed);
                }
            }
        }

        info!(target: "runtime::authority", "authority worker stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Enter {
                volume,
                handle,
                reply,
            } => {
                let accepted = self.devices.on_enter(volume, handle);
                if reply.send(accepted).is_err() {
                    debug!(target: "runtime::authority", "Enter reply channel closed (caller dropped)");
                }
            }
            Command::Exit {
                volume,
                handle,
                reply,
            } => {
                let accepted = self.devices.on_exit(volume, handle);
                if reply.send(accepted).is_err() {
                    debug!(target: "runtime::authority", "Exit reply channel closed (caller dropped)");
                }
            }
            Command::Activate { device, reply } => {
                let result = self.activate(device);
                self.flush();
                if reply.send(result).is_err() {
                    debug!(target: "runtime::authority", "Activate reply channel closed (caller dropped)");
                }
            }
            Command::AdvanceMode { device, reply } => {
                let result = self.devices.request_mode_advance(device).map_err(Into::into);
                self.flush();
                if reply.send(result).is_err() {
                    debug!(target: "runtime::authority", "AdvanceMode reply channel closed (caller dropped)");
                }
            }
            Command::Despawn { handle, reply } => {
                let destroyed = self.world.destroy(handle).is_ok();
                self.devices.evict(handle);
                if destroyed {
                    debug!(target: "runtime::authority", %handle, "despawned");
                    self.event_bus.publish(Event::Despawned(handle));
                }
                if reply.send(destroyed).is_err() {
                    debug!(target: "runtime::authority", "Despawn reply channel closed (caller dropped)");
                }
            }
            Command::EditWorld { edit } => edit(&mut self.world),
            Command::QueryDevices { reply } => {
                let statuses = self.devices.iter().map(DeviceStatus::from).collect();
                if reply.send(statuses).is_err() {
                    debug!(target: "runtime::authority", "QueryDevices reply channel closed (caller dropped)");
                }
            }
            Command::QueryWorld { reply } => {
                if reply.send(self.world.clone()).is_err() {
                    debug!(target: "runtime::authority", "QueryWorld reply channel closed (caller dropped)");
                }
            }
            Command::Join { reply } => {
                let snapshot = self.join();
                if reply.send(snapshot).is_err() {
                    warn!(target: "runtime::authority", "participant left before joining");
                }
            }
            Command::Resync { participant, reply } => {
                info!(target: "runtime::authority", %participant, "participant resynchronizing");
                if reply.send(self.snapshot(participant)).is_err() {
                    warn!(target: "runtime::authority", %participant, "participant left before resynchronizing");
                }
            }
            Command::Shutdown => {}
        }
    }

    fn activate(&mut self, device: DeviceId) -> Result<Ack> {
        let AuthorityContent {
            catalog,
            table,
            config,
            session,
        } = &self.content;
        let mut env = AuthorityEnv::new(
            &mut self.world,
            catalog.as_ref(),
            table,
            session,
            config,
            &self.rng,
        );
        Ok(self.devices.request_activate(device, &mut env)?)
    }

    fn tick(&mut self, elapsed: Duration) {
        let AuthorityContent {
            catalog,
            table,
            config,
            session,
        } = &self.content;
        let mut env = AuthorityEnv::new(
            &mut self.world,
            catalog.as_ref(),
            table,
            session,
            config,
            &self.rng,
        );
        let diagnostics = self.devices.tick(elapsed, &mut env);
        self.flush();
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }
    }

    /// Applies pending messages to the host's world and publishes them.
    fn flush(&mut self) {
        for message in self.devices.drain_outbox() {
            self.apply_locally(&message);
            match ReplicationFrame::encode(&message) {
                Ok(frame) => self.event_bus.publish(Event::Replication(frame)),
                Err(err) => {
                    error!(target: "runtime::authority", device = %message.device(), seq = message.seq(), %err, "replication frame dropped");
                }
            }
        }
    }

    fn apply_locally(&mut self, message: &ReplicationMessage) {
        let report =
            match self
                .replica
                .apply(message, &mut self.world, self.content.catalog.as_ref())
            {
                Ok(report) => report,
                Err(err) => {
                    warn!(target: "runtime::authority", device = %message.device(), %err, "host replica rejected message");
                    return;
                }
            };
        let device = message.device();
        for intent in report.intents {
            self.event_bus
                .publish(Event::Presentation(PresentationEvent {
                    participant: ParticipantId::HOST,
                    device,
                    intent,
                }));
        }
    }

    fn report(&self, diagnostic: Diagnostic) {
        warn!(
            target: "runtime::authority",
            device = %diagnostic.device,
            severity = diagnostic.severity.as_str(),
            code = %diagnostic.code,
            "{}",
            diagnostic.message
        );
        self.event_bus.publish(Event::Diagnostic(diagnostic));
    }

    fn join(&mut self) -> JoinSnapshot {
        let participant = ParticipantId(self.next_participant);
        self.next_participant += 1;
        info!(target: "runtime::authority", %participant, "participant joined");
        self.snapshot(participant)
    }

    /// Current state plus a receiver subscribed at the same instant, so no
    /// frame falls between the two.
    fn snapshot(&self, participant: ParticipantId) -> JoinSnapshot {
        JoinSnapshot {
            participant,
            world: InMemoryWorld::follower_of(&self.world),
            replica: self.replica.clone(),
            catalog: Arc::clone(&self.content.catalog),
            frames: self.event_bus.subscribe(Topic::Replication),
            command_buffer_size: self.command_buffer_size,
        }
    }
}
