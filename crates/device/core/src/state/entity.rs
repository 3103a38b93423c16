use super::{CosmeticId, EntityHandle, HostileKey, Identity, ItemKey, Position};

/// Read-only view of an entity, produced by [`crate::env::World::entity`].
///
/// `root` names the owning entity. A multi-part actor exposes several
/// handles to trigger volumes, all sharing one root, and devices key their
/// "already handled" bookkeeping on the root.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityView {
    pub handle: EntityHandle,
    pub root: EntityHandle,
    pub position: Position,
    pub kind: EntityKind,
}

/// Closed set of entity kinds a device knows how to handle.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityKind {
    /// Inert object lying in the world (or held by a player).
    Object {
        key: ItemKey,
        held: bool,
        /// Resting position on the floor; objects are moved by this point.
        floor_position: Position,
    },
    /// Player-controlled occupant.
    Player { cosmetic: CosmeticId },
    /// AI-controlled hostile actor.
    Hostile {
        key: HostileKey,
        dead: bool,
        /// Door-opening strength advertised by the actor's AI.
        door_strength: f32,
    },
}

impl EntityKind {
    pub fn class(&self) -> EntityClass {
        match self {
            EntityKind::Object { .. } => EntityClass::Object,
            EntityKind::Player { .. } => EntityClass::Player,
            EntityKind::Hostile { .. } => EntityClass::Hostile,
        }
    }

    /// Outcome-table identity; players have none.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            EntityKind::Object { key, .. } => Some(Identity::Object(key.clone())),
            EntityKind::Hostile { key, .. } => Some(Identity::Hostile(key.clone())),
            EntityKind::Player { .. } => None,
        }
    }
}

/// Discriminant of [`EntityKind`], cheap to copy into replication entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum EntityClass {
    Object,
    Player,
    Hostile,
}
