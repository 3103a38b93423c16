//! Self-contained world used by the headless runtime and by tests.

use std::collections::BTreeMap;

use device_core::{
    CosmeticId, EntityHandle, EntityKind, EntityView, HostileKey, Identity, ItemKey, PlayerEffect,
    Position, PropsContainer, ReplicaError, ReplicaWorld, World, WorldError,
};
use tracing::trace;

/// Full health of a player.
pub const MAX_HEALTH: u32 = 100;

/// Everything the in-memory world knows about one root entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityRecord {
    pub handle: EntityHandle,
    pub position: Position,
    pub kind: EntityKind,
    /// Monetary value of an object, once assigned.
    pub value: Option<u32>,
    /// Battery state of an object, once assigned.
    pub charged: Option<bool>,
    pub health: u32,
    pub alive: bool,
    /// Cosmetic a mimic hostile took over from a converted player.
    pub disguise: Option<CosmeticId>,
}

impl EntityRecord {
    fn new(handle: EntityHandle, position: Position, kind: EntityKind) -> Self {
        Self {
            handle,
            position,
            kind,
            value: None,
            charged: None,
            health: MAX_HEALTH,
            alive: true,
            disguise: None,
        }
    }

    fn from_identity(handle: EntityHandle, identity: &Identity, at: Position) -> Self {
        let kind = match identity {
            Identity::Object(key) => EntityKind::Object {
                key: key.clone(),
                held: false,
                floor_position: at,
            },
            Identity::Hostile(key) => EntityKind::Hostile {
                key: key.clone(),
                dead: false,
                door_strength: 0.0,
            },
        };
        Self::new(handle, at, kind)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.kind.identity()
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player { .. })
    }

    pub fn cosmetic(&self) -> Option<CosmeticId> {
        match self.kind {
            EntityKind::Player { cosmetic } => Some(cosmetic),
            _ => None,
        }
    }
}

/// Map-backed world that plays both the authority and the replica role.
///
/// Entities are keyed by root handle. Extra parts registered with
/// [`InMemoryWorld::add_part`] resolve to their root's record, so a
/// multi-part actor is destroyed or moved as a unit.
///
/// Navigation is modelled as a set of floor heights: a point snaps onto the
/// nearest floor within the search radius. With no floors every point is
/// navigable as-is.
#[derive(Clone, Debug, PartialEq)]
pub struct InMemoryWorld {
    entities: BTreeMap<EntityHandle, EntityRecord>,
    parts: BTreeMap<EntityHandle, EntityHandle>,
    floors: Vec<f32>,
    props_container: Option<PropsContainer>,
    next_handle: u64,
}

impl Default for InMemoryWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWorld {
    pub const PROPS_CONTAINER: PropsContainer = PropsContainer(1);

    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            parts: BTreeMap::new(),
            floors: Vec::new(),
            props_container: Some(Self::PROPS_CONTAINER),
            next_handle: 1,
        }
    }

    #[must_use]
    pub fn with_floors(mut self, floors: impl IntoIterator<Item = f32>) -> Self {
        self.floors = floors.into_iter().collect();
        self
    }

    /// Removes or restores the container spawned objects are parented to.
    pub fn set_props_container(&mut self, container: Option<PropsContainer>) {
        self.props_container = container;
    }

    /// Copy handed to a participant joining the session.
    pub fn follower_of(host: &InMemoryWorld) -> Self {
        host.clone()
    }

    fn allocate(&mut self) -> EntityHandle {
        let handle = EntityHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn insert(&mut self, record: EntityRecord) -> EntityHandle {
        let handle = record.handle;
        self.next_handle = self.next_handle.max(handle.0 + 1);
        self.entities.insert(handle, record);
        handle
    }

    pub fn add_object(&mut self, key: impl AsRef<str>, at: Position) -> EntityHandle {
        let handle = self.allocate();
        self.insert(EntityRecord::new(
            handle,
            at,
            EntityKind::Object {
                key: ItemKey::new(key),
                held: false,
                floor_position: at,
            },
        ))
    }

    pub fn add_player(&mut self, cosmetic: CosmeticId, at: Position) -> EntityHandle {
        let handle = self.allocate();
        self.insert(EntityRecord::new(
            handle,
            at,
            EntityKind::Player { cosmetic },
        ))
    }

    pub fn add_hostile(
        &mut self,
        key: impl AsRef<str>,
        at: Position,
        door_strength: f32,
    ) -> EntityHandle {
        let handle = self.allocate();
        self.insert(EntityRecord::new(
            handle,
            at,
            EntityKind::Hostile {
                key: HostileKey::new(key),
                dead: false,
                door_strength,
            },
        ))
    }

    /// Registers another collider handle belonging to `root`.
    pub fn add_part(&mut self, root: EntityHandle) -> Option<EntityHandle> {
        if !self.entities.contains_key(&root) {
            return None;
        }
        let part = self.allocate();
        self.parts.insert(part, root);
        Some(part)
    }

    /// Marks an object as carried (or dropped) by a player.
    pub fn set_held(&mut self, handle: EntityHandle, held: bool) -> bool {
        match self.record_mut(handle).map(|record| &mut record.kind) {
            Some(EntityKind::Object { held: slot, .. }) => {
                *slot = held;
                true
            }
            _ => false,
        }
    }

    /// Moves an object so that it rests at `at`.
    pub fn drop_at(&mut self, handle: EntityHandle, at: Position) -> bool {
        let Some(record) = self.record_mut(handle) else {
            return false;
        };
        record.position = at;
        if let EntityKind::Object { floor_position, .. } = &mut record.kind {
            *floor_position = at;
        }
        true
    }

    pub fn kill(&mut self, handle: EntityHandle) -> bool {
        let Some(record) = self.record_mut(handle) else {
            return false;
        };
        record.alive = false;
        record.health = 0;
        if let EntityKind::Hostile { dead, .. } = &mut record.kind {
            *dead = true;
        }
        true
    }

    fn root_of(&self, handle: EntityHandle) -> EntityHandle {
        self.parts.get(&handle).copied().unwrap_or(handle)
    }

    pub fn record(&self, handle: EntityHandle) -> Option<&EntityRecord> {
        self.entities.get(&self.root_of(handle))
    }

    fn record_mut(&mut self, handle: EntityHandle) -> Option<&mut EntityRecord> {
        let root = self.root_of(handle);
        self.entities.get_mut(&root)
    }

    fn require(&mut self, handle: EntityHandle) -> Result<&mut EntityRecord, ReplicaError> {
        self.record_mut(handle)
            .ok_or(ReplicaError::TargetExpired(handle))
    }

    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.values()
    }

    /// Records with the given identity.
    pub fn find(&self, identity: &Identity) -> impl Iterator<Item = &EntityRecord> {
        self.entities
            .values()
            .filter(move |record| record.identity().as_ref() == Some(identity))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn remove_root(&mut self, handle: EntityHandle) -> bool {
        let root = self.root_of(handle);
        let removed = self.entities.remove(&root).is_some();
        if removed {
            self.parts.retain(|_, owner| *owner != root);
        }
        removed
    }
}

impl World for InMemoryWorld {
    fn entity(&self, handle: EntityHandle) -> Option<EntityView> {
        let root = self.root_of(handle);
        self.entities.get(&root).map(|record| EntityView {
            handle,
            root,
            position: record.position,
            kind: record.kind.clone(),
        })
    }

    fn props_container(&self) -> Option<PropsContainer> {
        self.props_container
    }

    fn nav_position(&self, near: Position, radius: f32) -> Option<Position> {
        if self.floors.is_empty() {
            return Some(near);
        }
        self.floors
            .iter()
            .copied()
            .filter(|floor| (floor - near.y).abs() <= radius)
            .min_by(|a, b| (a - near.y).abs().total_cmp(&(b - near.y).abs()))
            .map(|floor| Position::new(near.x, floor, near.z))
    }

    fn destroy(&mut self, handle: EntityHandle) -> Result<(), WorldError> {
        if self.remove_root(handle) {
            trace!(target: "runtime::world", %handle, "destroyed");
            Ok(())
        } else {
            Err(WorldError::Expired(handle))
        }
    }

    fn spawn(
        &mut self,
        identity: &Identity,
        at: Position,
        container: PropsContainer,
    ) -> Result<EntityHandle, WorldError> {
        if self.props_container != Some(container) {
            return Err(WorldError::SpawnRefused {
                identity: identity.clone(),
                reason: "props container is gone",
            });
        }
        let handle = self.allocate();
        trace!(target: "runtime::world", %handle, %identity, "spawned");
        Ok(self.insert(EntityRecord::from_identity(handle, identity, at)))
    }
}

impl ReplicaWorld for InMemoryWorld {
    fn contains(&self, handle: EntityHandle) -> bool {
        self.entities.contains_key(&self.root_of(handle))
    }

    fn materialize(&mut self, handle: EntityHandle, identity: &Identity, at: Position) {
        if !ReplicaWorld::contains(self, handle) {
            self.insert(EntityRecord::from_identity(handle, identity, at));
        }
    }

    fn remove(&mut self, handle: EntityHandle) -> bool {
        self.remove_root(handle)
    }

    fn set_value(&mut self, handle: EntityHandle, value: u32) -> Result<(), ReplicaError> {
        let record = self.require(handle)?;
        if !matches!(record.kind, EntityKind::Object { .. }) {
            return Err(ReplicaError::Unsupported {
                handle,
                effect: "value",
            });
        }
        record.value = Some(value);
        Ok(())
    }

    fn set_charge(&mut self, handle: EntityHandle, full: bool) -> Result<(), ReplicaError> {
        let record = self.require(handle)?;
        if !matches!(record.kind, EntityKind::Object { .. }) {
            return Err(ReplicaError::Unsupported {
                handle,
                effect: "charge",
            });
        }
        record.charged = Some(full);
        Ok(())
    }

    fn teleport(&mut self, handle: EntityHandle, to: Position) -> Result<(), ReplicaError> {
        let record = self.require(handle)?;
        record.position = to;
        if let EntityKind::Object { floor_position, .. } = &mut record.kind {
            *floor_position = to;
        }
        Ok(())
    }

    fn apply_player_effect(
        &mut self,
        player: EntityHandle,
        effect: &PlayerEffect,
    ) -> Result<(), ReplicaError> {
        let record = self.require(player)?;
        let EntityKind::Player { cosmetic } = &mut record.kind else {
            return Err(ReplicaError::Unsupported {
                handle: player,
                effect: "player effect",
            });
        };
        match effect {
            PlayerEffect::Kill => {
                record.health = 0;
                record.alive = false;
            }
            PlayerEffect::Damage(amount) => {
                record.health = record.health.saturating_sub(*amount);
                record.alive = record.health > 0;
            }
            PlayerEffect::Heal(amount) => {
                record.health = record.health.saturating_add(*amount).min(MAX_HEALTH);
            }
            PlayerEffect::Cosmetic(next) => *cosmetic = *next,
            PlayerEffect::Mimic {
                mimic,
                cosmetic: worn,
                ..
            } => {
                record.health = 0;
                record.alive = false;
                let worn = *worn;
                if let Some(mimic) = self.record_mut(*mimic) {
                    mimic.disguise = Some(worn);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_resolve_to_their_root() {
        let mut world = InMemoryWorld::new();
        let root = world.add_hostile("crawler", Position::ORIGIN, 0.5);
        let part = world.add_part(root).unwrap();

        let view = world.entity(part).unwrap();
        assert_eq!((view.handle, view.root), (part, root));

        world.destroy(part).unwrap();
        assert!(world.entity(root).is_none());
        assert!(world.entity(part).is_none());
    }

    #[test]
    fn nav_snaps_to_nearest_floor_in_range() {
        let world = InMemoryWorld::new().with_floors([0.0, -15.36]);
        let near_bottom = Position::new(1.0, -14.0, 2.0);
        assert_eq!(
            world.nav_position(near_bottom, 5.0),
            Some(Position::new(1.0, -15.36, 2.0))
        );
        assert_eq!(world.nav_position(Position::new(0.0, -7.5, 0.0), 5.0), None);
    }

    #[test]
    fn spawn_needs_the_props_container() {
        let mut world = InMemoryWorld::new();
        world.set_props_container(None);
        let refused = world.spawn(
            &Identity::object("bolt"),
            Position::ORIGIN,
            InMemoryWorld::PROPS_CONTAINER,
        );
        assert!(matches!(refused, Err(WorldError::SpawnRefused { .. })));
    }

    #[test]
    fn player_effects_update_health_and_disguise() {
        let mut world = InMemoryWorld::new();
        let player = world.add_player(0, Position::ORIGIN);
        world
            .apply_player_effect(player, &PlayerEffect::Damage(60))
            .unwrap();
        world
            .apply_player_effect(player, &PlayerEffect::Heal(500))
            .unwrap();
        assert_eq!(world.record(player).map(|r| r.health), Some(MAX_HEALTH));

        let mimic = EntityHandle(99);
        world.materialize(mimic, &Identity::hostile("masked"), Position::ORIGIN);
        world
            .apply_player_effect(
                player,
                &PlayerEffect::Mimic {
                    mimic,
                    key: HostileKey::new("masked"),
                    cosmetic: 0,
                },
            )
            .unwrap();
        assert_eq!(world.record(player).map(|r| r.alive), Some(false));
        assert_eq!(world.record(mimic).and_then(|r| r.disguise), Some(0));
    }

    #[test]
    fn effects_on_missing_targets_report_expiry() {
        let mut world = InMemoryWorld::new();
        assert_eq!(
            world.teleport(EntityHandle(5), Position::ORIGIN),
            Err(ReplicaError::TargetExpired(EntityHandle(5)))
        );
        let bolt = world.add_object("bolt", Position::ORIGIN);
        assert!(matches!(
            world.apply_player_effect(bolt, &PlayerEffect::Kill),
            Err(ReplicaError::Unsupported { .. })
        ));
    }
}
