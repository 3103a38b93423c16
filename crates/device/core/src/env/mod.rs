//! Collaborators a device reaches through explicit injection.
//!
//! The authority-side [`World`] answers handle lookups with an explicit
//! "not found" and performs the spawn/destroy half of every outcome. The
//! [`Catalog`] and [`crate::outcome::OutcomeTable`] are read-only after load.
//! Session-wide facts (seed, value multiplier, cosmetics, death rules) live in
//! a [`SessionContext`] constructed once per session. [`AuthorityEnv`] bundles
//! all of them for a single call into a device.
mod catalog;
mod rng;

pub use catalog::{Catalog, HostileDefinition, ItemDefinition, StaticCatalog, ValueRange};
pub use rng::{PcgRng, RngOracle, RollContext, compute_seed};

use crate::config::DeviceConfig;
use crate::error::WorldError;
use crate::outcome::OutcomeTable;
use crate::state::{CosmeticId, EntityHandle, EntityView, Identity, Position};

/// Parent under which spawned props are registered for replication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropsContainer(pub u64);

/// Authority view of the simulated world.
pub trait World: Send {
    /// Resolves a weak handle; `None` when the entity is gone.
    fn entity(&self, handle: EntityHandle) -> Option<EntityView>;

    /// Container spawned props are parented to; `None` aborts the activation.
    fn props_container(&self) -> Option<PropsContainer>;

    /// Closest navigable point within `radius` of `near`.
    fn nav_position(&self, near: Position, radius: f32) -> Option<Position>;

    fn destroy(&mut self, handle: EntityHandle) -> Result<(), WorldError>;

    /// Instantiates `identity` and registers it for replication.
    fn spawn(
        &mut self,
        identity: &Identity,
        at: Position,
        container: PropsContainer,
    ) -> Result<EntityHandle, WorldError>;
}

/// Which side of the one-way authority a participant is on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    #[default]
    Authority,
    Follower,
}

impl Role {
    pub const fn is_authority(self) -> bool {
        matches!(self, Self::Authority)
    }
}

/// Session-wide facts injected into devices.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionContext {
    pub seed: u64,
    pub role: Role,
    /// Applied to every freshly drawn magnitude.
    pub value_multiplier: f32,
    /// Whether session rules currently allow a player to die.
    pub death_allowed: bool,
    /// Cosmetics a player may be reassigned to.
    pub cosmetics: Vec<CosmeticId>,
}

impl SessionContext {
    pub fn authority(seed: u64) -> Self {
        Self {
            seed,
            role: Role::Authority,
            value_multiplier: 1.0,
            death_allowed: true,
            cosmetics: Vec::new(),
        }
    }

    pub fn follower(seed: u64) -> Self {
        Self {
            role: Role::Follower,
            ..Self::authority(seed)
        }
    }

    #[must_use]
    pub fn with_value_multiplier(mut self, multiplier: f32) -> Self {
        self.value_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_death_allowed(mut self, allowed: bool) -> Self {
        self.death_allowed = allowed;
        self
    }

    #[must_use]
    pub fn with_cosmetics(mut self, cosmetics: impl IntoIterator<Item = CosmeticId>) -> Self {
        self.cosmetics = cosmetics.into_iter().collect();
        self
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::authority(0)
    }
}

/// Everything a device needs for one authority-side step.
pub struct AuthorityEnv<'a> {
    pub world: &'a mut dyn World,
    pub catalog: &'a dyn Catalog,
    pub table: &'a OutcomeTable,
    pub session: &'a SessionContext,
    pub config: &'a DeviceConfig,
    pub rng: &'a dyn RngOracle,
}

impl<'a> AuthorityEnv<'a> {
    pub fn new(
        world: &'a mut dyn World,
        catalog: &'a dyn Catalog,
        table: &'a OutcomeTable,
        session: &'a SessionContext,
        config: &'a DeviceConfig,
        rng: &'a dyn RngOracle,
    ) -> Self {
        Self {
            world,
            catalog,
            table,
            session,
            config,
            rng,
        }
    }

    /// Reborrows the environment for a nested call.
    pub fn reborrow(&mut self) -> AuthorityEnv<'_> {
        AuthorityEnv {
            world: &mut *self.world,
            catalog: self.catalog,
            table: self.table,
            session: self.session,
            config: self.config,
            rng: self.rng,
        }
    }
}
