//! Cloneable façades for issuing commands to the runtime.
//!
//! [`RuntimeHandle`] hides channel plumbing to the authority worker;
//! [`FollowerHandle`] does the same for one joined participant.
use device_core::{Ack, DeviceId, DeviceShadow, EntityHandle, VolumeId};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::errors::{Result, RuntimeError};
use super::status::DeviceStatus;
use crate::events::{Event, EventBus, ParticipantId, Topic};
use crate::workers::{Command, FollowerCommand, FollowerWorker, WorldEdit};
use crate::world::InMemoryWorld;

const AUTHORITY: &str = "authority";
const FOLLOWER: &str = "follower";

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl RuntimeHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed { worker: AUTHORITY })?;

        reply_rx
            .await
            .map_err(|source| RuntimeError::ReplyChannelClosed {
                worker: AUTHORITY,
                source,
            })
    }

    /// Reports that `handle` entered a trigger volume.
    ///
    /// Returns `false` when the event was ignored (unknown volume).
    pub async fn enter(&self, volume: VolumeId, handle: EntityHandle) -> Result<bool> {
        self.request(|reply| Command::Enter {
            volume,
            handle,
            reply,
        })
        .await
    }

    /// Reports that `handle` left a trigger volume.
    pub async fn exit(&self, volume: VolumeId, handle: EntityHandle) -> Result<bool> {
        self.request(|reply| Command::Exit {
            volume,
            handle,
            reply,
        })
        .await
    }

    /// Asks a device to start a cycle (or, for a door, to toggle).
    pub async fn activate(&self, device: DeviceId) -> Result<Ack> {
        self.request(|reply| Command::Activate { device, reply })
            .await?
    }

    /// Asks a device to advance its mode (turn the converter dial).
    pub async fn advance_mode(&self, device: DeviceId) -> Result<Ack> {
        self.request(|reply| Command::AdvanceMode { device, reply })
            .await?
    }

    /// Destroys an entity, forgets it in every trigger volume and tells
    /// every follower to drop it.
    pub async fn despawn(&self, handle: EntityHandle) -> Result<bool> {
        self.request(|reply| Command::Despawn { handle, reply })
            .await
    }

    /// Runs `edit` against the authoritative world and returns its result.
    ///
    /// Edits are host-local: participants that already joined do not see
    /// them.
    pub async fn edit_world<R, F>(&self, edit: F) -> Result<R>
    where
        F: FnOnce(&mut InMemoryWorld) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let edit: WorldEdit = Box::new(move |world| {
            // The caller may have stopped waiting; the edit still applies.
            let _ = result_tx.send(edit(world));
        });

        self.command_tx
            .send(Command::EditWorld { edit })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed { worker: AUTHORITY })?;

        result_rx
            .await
            .map_err(|source| RuntimeError::ReplyChannelClosed {
                worker: AUTHORITY,
                source,
            })
    }

    /// Authority-side status of every device.
    pub async fn devices(&self) -> Result<Vec<DeviceStatus>> {
        self.request(|reply| Command::QueryDevices { reply }).await
    }

    pub async fn device(&self, id: DeviceId) -> Result<Option<DeviceStatus>> {
        Ok(self
            .devices()
            .await?
            .into_iter()
            .find(|status| status.id == id))
    }

    /// Snapshot of the authoritative world.
    pub async fn world(&self) -> Result<InMemoryWorld> {
        self.request(|reply| Command::QueryWorld { reply }).await
    }

    /// Joins a new participant that mirrors the session from now on.
    pub async fn join(&self) -> Result<FollowerHandle> {
        let snapshot = self.request(|reply| Command::Join { reply }).await?;
        let participant = snapshot.participant;
        let (command_tx, command_rx) = mpsc::channel(snapshot.command_buffer_size);
        let worker = FollowerWorker::new(
            snapshot,
            command_rx,
            self.command_tx.clone(),
            self.event_bus.clone(),
        );
        let task = tokio::spawn(async move {
            worker.run().await;
        });

        Ok(FollowerHandle {
            participant,
            command_tx,
            task,
        })
    }

    pub(crate) async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed { worker: AUTHORITY })
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Replication` - Encoded frames from the authority
    /// - `Topic::Diagnostic` - Aborted activations and lagging followers
    /// - `Topic::Presentation` - Intents per participant
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

/// Handle to one joined participant.
#[derive(Debug)]
pub struct FollowerHandle {
    participant: ParticipantId,
    command_tx: mpsc::Sender<FollowerCommand>,
    task: JoinHandle<()>,
}

impl FollowerHandle {
    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> FollowerCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed { worker: FOLLOWER })?;

        reply_rx
            .await
            .map_err(|source| RuntimeError::ReplyChannelClosed {
                worker: FOLLOWER,
                source,
            })
    }

    /// This participant's world, after every delivered frame is applied.
    pub async fn world(&self) -> Result<InMemoryWorld> {
        self.request(|reply| FollowerCommand::QueryWorld { reply })
            .await
    }

    pub async fn shadows(&self) -> Result<Vec<(DeviceId, DeviceShadow)>> {
        self.request(|reply| FollowerCommand::QueryShadows { reply })
            .await
    }

    pub async fn shadow(&self, device: DeviceId) -> Result<Option<DeviceShadow>> {
        Ok(self
            .shadows()
            .await?
            .into_iter()
            .find_map(|(id, shadow)| (id == device).then_some(shadow)))
    }

    /// Stops the follower and waits for it to finish.
    pub async fn leave(self) -> Result<()> {
        // A worker that already stopped has nothing left to shut down.
        let _ = self.command_tx.send(FollowerCommand::Shutdown).await;
        self.task.await.map_err(RuntimeError::WorkerJoin)
    }
}
