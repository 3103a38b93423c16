//! High-level runtime orchestrator.
//!
//! The runtime owns the authority worker, wires up command/event channels,
//! and exposes a builder-based API for hosts to drive a device session.

use std::sync::Arc;

use device_content::ContentBundle;
use device_core::{
    Catalog, Device, DeviceConfig, DeviceSet, OutcomeTable, Role, SessionContext,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::api::{Result, RuntimeError, RuntimeHandle};
use crate::events::{Event, EventBus, Topic};
use crate::workers::{AuthorityContent, AuthorityWorker, Command};
use crate::world::InMemoryWorld;

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Scheduler period; each tick advances every device by the real elapsed time.
    pub tick_interval: Duration,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            event_buffer_size: 256,
            command_buffer_size: 32,
        }
    }
}

/// Main runtime that hosts the authority for one session
///
/// Design: Runtime owns the authority worker and coordinates shutdown.
/// [`RuntimeHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    handle: RuntimeHandle,
    authority_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.handle.subscribe(topic)
    }

    /// Shutdown the runtime gracefully
    pub async fn shutdown(self) -> Result<()> {
        if let Err(err) = self.handle.shutdown().await {
            debug!(target: "runtime::authority", %err, "authority already stopped");
        }

        self.authority_handle
            .await
            .map_err(RuntimeError::WorkerJoin)
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    device_config: DeviceConfig,
    session: Option<SessionContext>,
    catalog: Option<Arc<dyn Catalog>>,
    table: Option<OutcomeTable>,
    world: InMemoryWorld,
    devices: Vec<Device>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            device_config: DeviceConfig::default(),
            session: None,
            catalog: None,
            table: None,
            world: InMemoryWorld::new(),
            devices: Vec::new(),
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Override device tunables
    pub fn device_config(mut self, config: DeviceConfig) -> Self {
        self.device_config = config;
        self
    }

    /// Session seed, cosmetics and rules. Defaults to seed `0` with the
    /// device config's value multiplier.
    pub fn session(mut self, session: SessionContext) -> Self {
        self.session = Some(session);
        self
    }

    /// Set required spawnable-identity catalog
    pub fn catalog(mut self, catalog: impl Catalog + 'static) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    /// Set required outcome table
    pub fn table(mut self, table: OutcomeTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Catalog, table and device tunables loaded together.
    pub fn content(self, bundle: ContentBundle) -> Self {
        self.catalog(bundle.catalog)
            .table(bundle.table)
            .device_config(bundle.config)
    }

    /// Initial authoritative world (empty by default)
    pub fn world(mut self, world: InMemoryWorld) -> Self {
        self.world = world;
        self
    }

    /// Place a device in the session
    pub fn device(mut self, device: impl Into<Device>) -> Self {
        self.devices.push(device.into());
        self
    }

    /// Build the runtime
    pub async fn build(self) -> Result<Runtime> {
        let catalog = self
            .catalog
            .ok_or(RuntimeError::MissingContent("a catalog"))?;
        let table = self
            .table
            .ok_or(RuntimeError::MissingContent("an outcome table"))?;

        let mut session = self.session.unwrap_or_else(|| {
            SessionContext::authority(0).with_value_multiplier(self.device_config.value_multiplier)
        });
        if !session.role.is_authority() {
            warn!(target: "runtime::authority", "session built as follower; hosting it as authority");
            session.role = Role::Authority;
        }

        let mut devices = DeviceSet::new(session.role);
        for device in self.devices {
            devices.insert(device)?;
        }

        let (command_tx, command_rx) = mpsc::channel::<Command>(self.config.command_buffer_size);
        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);

        let handle = RuntimeHandle::new(command_tx, event_bus.clone());

        let worker = AuthorityWorker::new(
            devices,
            self.world,
            AuthorityContent {
                catalog,
                table,
                config: self.device_config,
                session,
            },
            self.config.tick_interval,
            self.config.command_buffer_size,
            command_rx,
            event_bus,
        );

        let authority_handle = tokio::spawn(async move {
            worker.run().await;
        });

        Ok(Runtime {
            handle,
            authority_handle,
        })
    }
}
