use strum::{EnumCount, IntoEnumIterator};

/// Dial setting of the transformation chamber, ordered left to right.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumIter,
    strum::EnumCount,
    strum::Display,
    strum::IntoStaticStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConverterSetting {
    #[default]
    Rough,
    Coarse,
    #[strum(serialize = "ONETOONE")]
    OneToOne,
    Fine,
    #[strum(serialize = "VERYFINE")]
    VeryFine,
}

impl ConverterSetting {
    pub const COUNT: usize = <Self as EnumCount>::COUNT;

    /// Column index into per-mode candidate tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    /// Next setting on the dial, wrapping from VERYFINE back to ROUGH.
    #[must_use]
    pub fn next(self) -> Self {
        Self::from_index((self.index() + 1) % Self::COUNT).unwrap_or_default()
    }

    /// Knob rotation in degrees for the presentation layer.
    pub const fn dial_angle(self) -> f32 {
        match self {
            Self::Rough => 90.0,
            Self::Coarse => 45.0,
            Self::OneToOne => 0.0,
            Self::Fine => -45.0,
            Self::VeryFine => -90.0,
        }
    }

    /// Spawned battery-powered objects come out charged above COARSE.
    pub const fn charges_batteries(self) -> bool {
        self.index() > Self::Coarse.index()
    }
}

/// Stop of the two-stop lift.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum LiftStop {
    #[default]
    Top,
    Bottom,
}

impl LiftStop {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }

    /// Sign applied to the lift offset when departing from this stop.
    pub const fn travel_sign(self) -> f32 {
        match self {
            Self::Top => -1.0,
            Self::Bottom => 1.0,
        }
    }
}

/// Open/closed state of a powered door.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum DoorState {
    #[default]
    Closed,
    Open,
}

impl DoorState {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Closed => Self::Open,
            Self::Open => Self::Closed,
        }
    }

    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Persistent mode of any device, replicated verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceMode {
    Converter(ConverterSetting),
    Lift(LiftStop),
    Door(DoorState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_wraps_after_very_fine() {
        let mut setting = ConverterSetting::Rough;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(setting);
            setting = setting.next();
        }
        assert_eq!(
            seen,
            vec![
                ConverterSetting::Rough,
                ConverterSetting::Coarse,
                ConverterSetting::OneToOne,
                ConverterSetting::Fine,
                ConverterSetting::VeryFine,
                ConverterSetting::Rough,
            ]
        );
    }

    #[test]
    fn battery_charge_starts_at_one_to_one() {
        assert!(!ConverterSetting::Rough.charges_batteries());
        assert!(!ConverterSetting::Coarse.charges_batteries());
        assert!(ConverterSetting::OneToOne.charges_batteries());
        assert!(ConverterSetting::VeryFine.charges_batteries());
    }

    #[test]
    fn setting_names_match_recipe_columns() {
        assert_eq!(ConverterSetting::OneToOne.to_string(), "ONETOONE");
        assert_eq!(ConverterSetting::VeryFine.to_string(), "VERYFINE");
        assert_eq!(ConverterSetting::Coarse.to_string(), "COARSE");
    }

    #[test]
    fn lift_travels_down_from_top() {
        assert_eq!(LiftStop::Top.travel_sign(), -1.0);
        assert_eq!(LiftStop::Top.opposite(), LiftStop::Bottom);
    }
}
