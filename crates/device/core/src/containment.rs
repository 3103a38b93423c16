//! Trigger-volume occupancy, tracked by the authority only.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::env::Role;
use crate::error::DependencyError;
use crate::state::{EntityHandle, VolumeId};

/// Handles currently inside one trigger volume. Each handle appears once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainmentSet {
    members: BTreeSet<EntityHandle>,
}

impl ContainmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the handle was already present.
    pub fn insert(&mut self, handle: EntityHandle) -> bool {
        self.members.insert(handle)
    }

    /// Returns `false` if the handle was absent.
    pub fn remove(&mut self, handle: EntityHandle) -> bool {
        self.members.remove(&handle)
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.members.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.members.iter().copied()
    }
}

impl FromIterator<EntityHandle> for ContainmentSet {
    fn from_iter<T: IntoIterator<Item = EntityHandle>>(iter: T) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

/// Per-volume membership updated by enter/exit events.
///
/// A tracker built for a follower ignores every event: followers learn about
/// occupants only through replicated outcomes.
#[derive(Clone, Debug, Default)]
pub struct ContainmentTracker {
    role: Role,
    volumes: BTreeMap<VolumeId, ContainmentSet>,
}

impl ContainmentTracker {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            volumes: BTreeMap::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Starts tracking `volume` with no occupants. Re-registering keeps members.
    pub fn register(&mut self, volume: VolumeId) {
        self.volumes.entry(volume).or_default();
    }

    pub fn is_registered(&self, volume: VolumeId) -> bool {
        self.volumes.contains_key(&volume)
    }

    /// Returns `true` if the handle was added.
    pub fn on_enter(&mut self, volume: VolumeId, handle: EntityHandle) -> bool {
        if !self.role.is_authority() {
            return false;
        }
        let Some(set) = self.volumes.get_mut(&volume) else {
            warn!(target: "device::containment", ?volume, %handle, "enter on unregistered volume");
            return false;
        };
        let added = set.insert(handle);
        debug!(target: "device::containment", ?volume, %handle, added, "enter");
        added
    }

    /// Returns `true` if the handle was removed. Removing an absent handle is
    /// logged and otherwise ignored.
    pub fn on_exit(&mut self, volume: VolumeId, handle: EntityHandle) -> bool {
        if !self.role.is_authority() {
            return false;
        }
        let Some(set) = self.volumes.get_mut(&volume) else {
            warn!(target: "device::containment", ?volume, %handle, "exit on unregistered volume");
            return false;
        };
        let removed = set.remove(handle);
        if removed {
            debug!(target: "device::containment", ?volume, %handle, "exit");
        } else {
            warn!(target: "device::containment", ?volume, %handle, "exit for absent handle");
        }
        removed
    }

    /// Immutable copy of the current membership.
    pub fn snapshot(&self, volume: VolumeId) -> Result<ContainmentSet, DependencyError> {
        self.volumes
            .get(&volume)
            .cloned()
            .ok_or(DependencyError::Volume(volume))
    }

    /// Drops a destroyed entity from every volume without logging an anomaly.
    pub fn evict(&mut self, handle: EntityHandle) {
        for set in self.volumes.values_mut() {
            set.remove(handle);
        }
    }
}
