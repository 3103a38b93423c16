//! Follower worker: one participant's copy of the session.
//!
//! Decodes replication frames from the authority and applies them to the
//! participant's own world through its [`Replica`]. Frames at or below a
//! device's last applied sequence change nothing, so redelivery is safe.
//! A follower that lags behind the broadcast reloads the authority's state
//! and reports the gap on the diagnostic topic.

use std::sync::Arc;

use device_core::{Catalog, DeviceId, DeviceShadow, EntityHandle, Replica, World};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::authority::{Command, JoinSnapshot};
use crate::events::{Event, EventBus, FollowerLag, ParticipantId, PresentationEvent};
use crate::wire::ReplicationFrame;
use crate::world::InMemoryWorld;

/// Commands that can be sent to a follower worker.
///
/// Replies are sent only after every frame already delivered has been
/// applied.
pub(crate) enum FollowerCommand {
    QueryWorld {
        reply: oneshot::Sender<InMemoryWorld>,
    },
    QueryShadows {
        reply: oneshot::Sender<Vec<(DeviceId, DeviceShadow)>>,
    },
    Shutdown,
}

pub(crate) struct FollowerWorker {
    participant: ParticipantId,
    world: InMemoryWorld,
    replica: Replica,
    catalog: Arc<dyn Catalog>,
    frames: broadcast::Receiver<Event>,
    command_rx: mpsc::Receiver<FollowerCommand>,
    authority: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl FollowerWorker {
    pub fn new(
        snapshot: JoinSnapshot,
        command_rx: mpsc::Receiver<FollowerCommand>,
        authority: mpsc::Sender<Command>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            participant: snapshot.participant,
            world: snapshot.world,
            replica: snapshot.replica,
            catalog: snapshot.catalog,
            frames: snapshot.frames,
            command_rx,
            authority,
            event_bus,
        }
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        info!(target: "runtime::follower", participant = %self.participant, "follower started");

        loop {
            tokio::select! {
                biased;

                event = self.frames.recv() => {
                    match event {
                        Ok(Event::Replication(frame)) => self.apply(&frame),
                        Ok(Event::Despawned(handle)) => self.forget(handle),
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(
                                target: "runtime::follower",
                                participant = %self.participant,
                                skipped,
                                "replication frames lost"
                            );
                            self.event_bus.publish(Event::Lagged(FollowerLag {
                                participant: self.participant,
                                skipped,
                            }));
                            self.resync().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!(target: "runtime::follower", participant = %self.participant, "replication channel closed");
                            break;
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(FollowerCommand::QueryWorld { reply }) => {
                            if reply.send(self.world.clone()).is_err() {
                                debug!(target: "runtime::follower", "QueryWorld reply channel closed (caller dropped)");
                            }
                        }
                        Some(FollowerCommand::QueryShadows { reply }) => {
                            let shadows = self
                                .replica
                                .shadows()
                                .map(|(id, shadow)| (id, *shadow))
                                .collect();
                            if reply.send(shadows).is_err() {
                                debug!(target: "runtime::follower", "QueryShadows reply channel closed (caller dropped)");
                            }
                        }
                        Some(FollowerCommand::Shutdown) | None => break,
                    }
                }
            }
        }

        info!(target: "runtime::follower", participant = %self.participant, "follower stopped");
    }

    /// Replaces local state with a fresh authority snapshot. The new
    /// receiver starts exactly where the snapshot ends.
    async fn resync(&mut self) {
        let (reply, snapshot) = oneshot::channel();
        let request = Command::Resync {
            participant: self.participant,
            reply,
        };
        if self.authority.send(request).await.is_err() {
            error!(target: "runtime::follower", participant = %self.participant, "authority gone, cannot resync");
            return;
        }
        match snapshot.await {
            Ok(snapshot) => {
                self.world = snapshot.world;
                self.replica = snapshot.replica;
                self.frames = snapshot.frames;
                info!(target: "runtime::follower", participant = %self.participant, entities = self.world.len(), "resynchronized");
            }
            Err(_) => {
                error!(target: "runtime::follower", participant = %self.participant, "authority dropped resync request");
            }
        }
    }

    fn forget(&mut self, handle: EntityHandle) {
        if self.world.destroy(handle).is_err() {
            debug!(target: "runtime::follower", participant = %self.participant, %handle, "despawned entity already gone");
        }
    }

    fn apply(&mut self, frame: &ReplicationFrame) {
        let message = match frame.message() {
            Ok(message) => message,
            Err(err) => {
                warn!(target: "runtime::follower", participant = %self.participant, device = %frame.device, seq = frame.seq, %err, "frame skipped");
                return;
            }
        };

        let report = match self
            .replica
            .apply(&message, &mut self.world, self.catalog.as_ref())
        {
            Ok(report) => report,
            Err(err) => {
                warn!(target: "runtime::follower", participant = %self.participant, device = %frame.device, %err, "message rejected");
                return;
            }
        };
        if report.duplicate {
            return;
        }

        debug!(
            target: "runtime::follower",
            participant = %self.participant,
            device = %frame.device,
            seq = frame.seq,
            applied = report.applied,
            skipped = report.skipped,
            "frame applied"
        );
        for intent in report.intents {
            self.event_bus
                .publish(Event::Presentation(PresentationEvent {
                    participant: self.participant,
                    device: frame.device,
                    intent,
                }));
        }
    }
}
