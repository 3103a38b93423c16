use core::time::Duration;
use std::collections::BTreeMap;

use crate::state::HostileKey;

/// Durations of the timed phases of one activation, in seconds.
///
/// `Resolving` and `Unlocking` are instantaneous; only the three waits are
/// configurable.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PhaseTimings {
    /// Time between the lock broadcast and the dwell (presentation close time).
    pub lock_secs: f32,
    /// Time the occupants stay sealed before resolution.
    pub dwell_secs: f32,
    /// Time between announcing the batch and unlocking.
    pub settle_secs: f32,
}

impl PhaseTimings {
    pub const fn new(lock_secs: f32, dwell_secs: f32, settle_secs: f32) -> Self {
        Self {
            lock_secs,
            dwell_secs,
            settle_secs,
        }
    }

    pub fn lock(&self) -> Duration {
        secs(self.lock_secs)
    }

    pub fn dwell(&self) -> Duration {
        secs(self.dwell_secs)
    }

    pub fn settle(&self) -> Duration {
        secs(self.settle_secs)
    }

    /// Same timings with a different lock duration.
    #[must_use]
    pub fn with_lock(self, lock_secs: f32) -> Self {
        Self { lock_secs, ..self }
    }
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or(Duration::ZERO)
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConverterConfig {
    pub timings: PhaseTimings,
    /// Health removed by the COARSE player effect.
    pub damage: u32,
    /// Health restored by the FINE player effect.
    pub heal: u32,
    /// Hostile identity a player becomes under VERYFINE.
    pub mimic: String,
}

impl ConverterConfig {
    pub const DEFAULT_DAMAGE: u32 = 50;
    pub const DEFAULT_HEAL: u32 = 50;
    pub const DEFAULT_MIMIC: &'static str = "masked";

    pub fn mimic_key(&self) -> HostileKey {
        HostileKey::new(&self.mimic)
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            timings: PhaseTimings::new(2.0, 5.0, 7.0),
            damage: Self::DEFAULT_DAMAGE,
            heal: Self::DEFAULT_HEAL,
            mimic: Self::DEFAULT_MIMIC.to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LiftConfig {
    pub timings: PhaseTimings,
    /// Vertical distance between the two stops.
    pub offset: f32,
}

impl LiftConfig {
    pub const DEFAULT_OFFSET: f32 = 15.36;
}

impl Default for LiftConfig {
    fn default() -> Self {
        Self {
            timings: PhaseTimings::new(1.0, 10.0, 1.0),
            offset: Self::DEFAULT_OFFSET,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DoorConfig {
    pub timings: PhaseTimings,
    /// Lock duration used when the winning strength exceeds `fast_threshold`.
    pub fast_lock_secs: f32,
    /// Strength must be strictly above this to open the door.
    pub open_threshold: f32,
    pub fast_threshold: f32,
    /// Per-identity strength that replaces what the actor advertises.
    pub strength_overrides: BTreeMap<String, f32>,
}

impl DoorConfig {
    pub const DEFAULT_OPEN_THRESHOLD: f32 = 0.0;
    pub const DEFAULT_FAST_THRESHOLD: f32 = 1.5;

    /// Strength of a hostile, honouring overrides keyed case-insensitively.
    pub fn strength_of(&self, key: &HostileKey, advertised: f32) -> f32 {
        self.strength_overrides
            .iter()
            .find(|(name, _)| HostileKey::new(name.as_str()) == *key)
            .map(|(_, strength)| *strength)
            .unwrap_or(advertised)
    }

    /// Timings for an opening triggered by `strength`.
    pub fn timings_for(&self, strength: f32) -> PhaseTimings {
        if strength > self.fast_threshold {
            self.timings.with_lock(self.fast_lock_secs)
        } else {
            self.timings
        }
    }
}

impl Default for DoorConfig {
    fn default() -> Self {
        let mut strength_overrides = BTreeMap::new();
        strength_overrides.insert("maskedplayerenemy".to_owned(), 1.0);
        strength_overrides.insert("crawler".to_owned(), 2.0);
        Self {
            timings: PhaseTimings::new(1.0, 1.0, 0.0),
            fast_lock_secs: 0.5,
            open_threshold: Self::DEFAULT_OPEN_THRESHOLD,
            fast_threshold: Self::DEFAULT_FAST_THRESHOLD,
            strength_overrides,
        }
    }
}

/// Every tunable of the device framework.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    pub converter: ConverterConfig,
    pub lift: LiftConfig,
    pub door: DoorConfig,
    /// Search radius when snapping a point onto the navigable surface.
    pub nav_radius: f32,
    /// Multiplier applied to freshly drawn magnitudes unless the session overrides it.
    pub value_multiplier: f32,
}

impl DeviceConfig {
    pub const DEFAULT_NAV_RADIUS: f32 = 5.0;
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            converter: ConverterConfig::default(),
            lift: LiftConfig::default(),
            door: DoorConfig::default(),
            nav_radius: Self::DEFAULT_NAV_RADIUS,
            value_multiplier: 1.0,
        }
    }
}
