//! Identifiers and value types shared by every device.
//!
//! Handles are weak: a device never owns the entity behind an
//! [`EntityHandle`], and every lookup goes through
//! [`crate::env::World::entity`], which may report the entity as gone.
mod entity;
mod mode;

pub use entity::{EntityClass, EntityKind, EntityView};
pub use mode::{ConverterSetting, DeviceMode, DoorState, LiftStop};

use core::fmt;

/// Stable reference to a simulated entity, valid across participants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityHandle(pub u64);

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One physical device placement in the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-{}", self.0)
    }
}

/// Trigger volume whose occupants are tracked by the authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolumeId(pub u32);

/// Index of a cosmetic (suit) in the session's cosmetic list.
pub type CosmeticId = u32;

/// World-space position.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Returns this position shifted vertically by `dy`.
    #[must_use]
    pub fn offset_y(self, dy: f32) -> Self {
        Self {
            y: self.y + dy,
            ..self
        }
    }
}

/// Axis-aligned box used as a device's output area.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    pub center: Position,
    /// Half-size along each axis.
    pub extents: Position,
}

impl Region {
    pub const fn new(center: Position, extents: Position) -> Self {
        Self { center, extents }
    }
}

/// Lower-cased catalog key of an inert object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String"))]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-cased catalog key of a hostile actor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String"))]
pub struct HostileKey(String);

impl HostileKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for HostileKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for HostileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an entity *is*, as far as outcome tables are concerned.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Identity {
    Object(ItemKey),
    Hostile(HostileKey),
}

impl Identity {
    pub fn object(name: impl AsRef<str>) -> Self {
        Self::Object(ItemKey::new(name))
    }

    pub fn hostile(name: impl AsRef<str>) -> Self {
        Self::Hostile(HostileKey::new(name))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Object(key) => write!(f, "{key}"),
            Identity::Hostile(key) => write!(f, "!{key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        assert_eq!(ItemKey::new("Airhorn"), ItemKey::new(" airhorn "));
        assert_eq!(Identity::hostile("Crawler").to_string(), "!crawler");
    }

    #[test]
    fn offset_only_moves_vertically() {
        let moved = Position::new(1.0, 2.0, 3.0).offset_y(-15.36);
        assert_eq!(moved.x, 1.0);
        assert_eq!(moved.z, 3.0);
        assert!((moved.y - (2.0 - 15.36)).abs() < f32::EPSILON * 16.0);
    }
}
