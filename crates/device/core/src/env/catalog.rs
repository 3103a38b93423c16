use std::collections::BTreeMap;

use crate::state::{HostileKey, Identity, ItemKey};

/// Read-only lookup of the identities the world knows how to spawn.
pub trait Catalog: Send + Sync {
    fn item(&self, key: &ItemKey) -> Option<&ItemDefinition>;

    fn hostile(&self, key: &HostileKey) -> Option<&HostileDefinition>;

    fn contains(&self, identity: &Identity) -> bool {
        match identity {
            Identity::Object(key) => self.item(key).is_some(),
            Identity::Hostile(key) => self.hostile(key).is_some(),
        }
    }
}

/// Half-open `[min, max)` range of an object's monetary value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueRange {
    pub min: u32,
    pub max: u32,
}

impl ValueRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemDefinition {
    pub key: ItemKey,
    /// Present only for objects that carry a value (scrap).
    #[cfg_attr(feature = "serde", serde(default))]
    pub value_range: Option<ValueRange>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub requires_battery: bool,
}

impl ItemDefinition {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self {
            key: ItemKey::new(key),
            value_range: None,
            requires_battery: false,
        }
    }

    #[must_use]
    pub fn with_value(mut self, min: u32, max: u32) -> Self {
        self.value_range = Some(ValueRange::new(min, max));
        self
    }

    #[must_use]
    pub fn with_battery(mut self) -> Self {
        self.requires_battery = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostileDefinition {
    pub key: HostileKey,
    #[cfg_attr(feature = "serde", serde(default))]
    pub display_name: String,
}

impl HostileDefinition {
    pub fn new(key: impl AsRef<str>) -> Self {
        let display_name = key.as_ref().trim().to_owned();
        Self {
            key: HostileKey::new(key),
            display_name,
        }
    }
}

/// Catalog backed by in-memory maps.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    items: BTreeMap<ItemKey, ItemDefinition>,
    hostiles: BTreeMap<HostileKey, HostileDefinition>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(
        items: impl IntoIterator<Item = ItemDefinition>,
        hostiles: impl IntoIterator<Item = HostileDefinition>,
    ) -> Self {
        let mut catalog = Self::new();
        for item in items {
            catalog.insert_item(item);
        }
        for hostile in hostiles {
            catalog.insert_hostile(hostile);
        }
        catalog
    }

    /// Later definitions replace earlier ones with the same key.
    pub fn insert_item(&mut self, definition: ItemDefinition) {
        self.items.insert(definition.key.clone(), definition);
    }

    pub fn insert_hostile(&mut self, definition: HostileDefinition) {
        self.hostiles.insert(definition.key.clone(), definition);
    }

    #[must_use]
    pub fn with_item(mut self, definition: ItemDefinition) -> Self {
        self.insert_item(definition);
        self
    }

    #[must_use]
    pub fn with_hostile(mut self, definition: HostileDefinition) -> Self {
        self.insert_hostile(definition);
        self
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemDefinition> {
        self.items.values()
    }

    pub fn hostiles(&self) -> impl Iterator<Item = &HostileDefinition> {
        self.hostiles.values()
    }
}

impl Catalog for StaticCatalog {
    fn item(&self, key: &ItemKey) -> Option<&ItemDefinition> {
        self.items.get(key)
    }

    fn hostile(&self, key: &HostileKey) -> Option<&HostileDefinition> {
        self.hostiles.get(key)
    }
}
