use tracing::warn;

use super::{Candidate, OutcomeTable};
use crate::env::{Catalog, RngOracle};
use crate::state::{ConverterSetting, Identity};

/// Where a replacement decision came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResolutionSource {
    Table,
    /// Identity or column was not configured: duplicate with fresh attributes.
    Fallback,
}

/// Decision for one occupant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Destroy,
    Replace {
        identity: Identity,
        source: ResolutionSource,
    },
    /// The identity is unknown to the catalog; the occupant is left untouched.
    Unavailable,
}

/// Maps an identity and setting onto exactly one decision.
pub struct OutcomeResolver<'a> {
    table: &'a OutcomeTable,
    catalog: &'a dyn Catalog,
    rng: &'a dyn RngOracle,
}

impl<'a> OutcomeResolver<'a> {
    pub fn new(table: &'a OutcomeTable, catalog: &'a dyn Catalog, rng: &'a dyn RngOracle) -> Self {
        Self {
            table,
            catalog,
            rng,
        }
    }

    /// Resolves `identity` under `setting`, drawing with `seed`.
    ///
    /// Hostile and object identities live in the same table but never share
    /// a key, so the lookup is keyed by kind implicitly. Unconfigured
    /// identities and empty columns fall back to a same-identity replacement.
    pub fn resolve(&self, identity: &Identity, setting: ConverterSetting, seed: u64) -> Resolution {
        if !self.catalog.contains(identity) {
            warn!(target: "device::converter", %identity, "identity not in catalog, no conversion available");
            return Resolution::Unavailable;
        }

        let candidates = match self.table.candidates(identity, setting) {
            Some(list) if !list.is_empty() => list,
            _ => {
                return Resolution::Replace {
                    identity: identity.clone(),
                    source: ResolutionSource::Fallback,
                };
            }
        };

        match &candidates[self.rng.pick(seed, candidates.len())] {
            Candidate::Destroy => Resolution::Destroy,
            Candidate::Same => Resolution::Replace {
                identity: identity.clone(),
                source: ResolutionSource::Table,
            },
            Candidate::Become(target) if self.catalog.contains(target) => Resolution::Replace {
                identity: target.clone(),
                source: ResolutionSource::Table,
            },
            Candidate::Become(target) => {
                warn!(target: "device::converter", %identity, %target, "conversion target not in catalog");
                Resolution::Unavailable
            }
        }
    }
}

/// Draws a fresh magnitude for `identity`, or `None` if it carries no value.
///
/// The draw is uniform over `[min, max)` and scaled by `multiplier`, rounding down.
pub fn draw_magnitude(
    catalog: &dyn Catalog,
    identity: &Identity,
    multiplier: f32,
    rng: &dyn RngOracle,
    seed: u64,
) -> Option<u32> {
    let Identity::Object(key) = identity else {
        return None;
    };
    let range = catalog.item(key)?.value_range?;
    let draw = rng.below(seed, range.min, range.max);
    Some((draw as f32 * multiplier.max(0.0)).floor() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{HostileDefinition, ItemDefinition, PcgRng, RollContext, StaticCatalog, compute_seed};

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_item(ItemDefinition::new("a"))
            .with_item(ItemDefinition::new("b"))
            .with_item(ItemDefinition::new("c"))
            .with_item(ItemDefinition::new("d").with_value(30, 90))
            .with_hostile(HostileDefinition::new("crawler"))
    }

    fn seed(trial: u64) -> u64 {
        compute_seed(99, trial, 1, RollContext::Candidate)
    }

    #[test]
    fn same_sentinel_respawns_identity() {
        let mut table = OutcomeTable::new();
        table.add(Identity::object("a"), ConverterSetting::OneToOne, [Candidate::Same]);
        let catalog = catalog();
        let resolver = OutcomeResolver::new(&table, &catalog, &PcgRng);
        for trial in 0..20 {
            assert_eq!(
                resolver.resolve(&Identity::object("a"), ConverterSetting::OneToOne, seed(trial)),
                Resolution::Replace {
                    identity: Identity::object("a"),
                    source: ResolutionSource::Table
                }
            );
        }
    }

    #[test]
    fn repeated_candidates_weight_the_draw() {
        let mut table = OutcomeTable::new();
        table.add(
            Identity::object("b"),
            ConverterSetting::Rough,
            [
                Candidate::Destroy,
                Candidate::Destroy,
                Candidate::Become(Identity::object("c")),
            ],
        );
        let catalog = catalog();
        let resolver = OutcomeResolver::new(&table, &catalog, &PcgRng);

        let (mut destroyed, mut became_c) = (0, 0);
        for trial in 0..300 {
            match resolver.resolve(&Identity::object("b"), ConverterSetting::Rough, seed(trial)) {
                Resolution::Destroy => destroyed += 1,
                Resolution::Replace { identity, .. } if identity == Identity::object("c") => {
                    became_c += 1
                }
                other => panic!("unexpected resolution {other:?}"),
            }
        }
        assert_eq!(destroyed + became_c, 300);
        assert!((160..=240).contains(&destroyed), "destroyed {destroyed}");
        assert!((60..=140).contains(&became_c), "became c {became_c}");
    }

    #[test]
    fn unconfigured_identity_falls_back_with_fresh_value() {
        let table = OutcomeTable::new();
        let catalog = catalog();
        let resolver = OutcomeResolver::new(&table, &catalog, &PcgRng);
        let d = Identity::object("d");
        for setting in [ConverterSetting::Rough, ConverterSetting::VeryFine] {
            for trial in 0..50 {
                assert_eq!(
                    resolver.resolve(&d, setting, seed(trial)),
                    Resolution::Replace {
                        identity: d.clone(),
                        source: ResolutionSource::Fallback
                    }
                );
                let value = draw_magnitude(&catalog, &d, 1.0, &PcgRng, seed(trial));
                assert!(matches!(value, Some(v) if (30..90).contains(&v)));
            }
        }
    }

    #[test]
    fn empty_column_falls_back() {
        let mut table = OutcomeTable::new();
        table.add(Identity::object("a"), ConverterSetting::Fine, [Candidate::Destroy]);
        let catalog = catalog();
        let resolver = OutcomeResolver::new(&table, &catalog, &PcgRng);
        assert!(matches!(
            resolver.resolve(&Identity::object("a"), ConverterSetting::Rough, 1),
            Resolution::Replace {
                source: ResolutionSource::Fallback,
                ..
            }
        ));
    }

    #[test]
    fn unknown_identity_is_unavailable() {
        let table = OutcomeTable::new();
        let catalog = catalog();
        let resolver = OutcomeResolver::new(&table, &catalog, &PcgRng);
        assert_eq!(
            resolver.resolve(&Identity::object("ghost"), ConverterSetting::Rough, 1),
            Resolution::Unavailable
        );
    }

    #[test]
    fn hostile_may_become_object() {
        let mut table = OutcomeTable::new();
        table.add(
            Identity::hostile("crawler"),
            ConverterSetting::Fine,
            [Candidate::Become(Identity::object("a"))],
        );
        let catalog = catalog();
        let resolver = OutcomeResolver::new(&table, &catalog, &PcgRng);
        assert_eq!(
            resolver.resolve(&Identity::hostile("crawler"), ConverterSetting::Fine, 5),
            Resolution::Replace {
                identity: Identity::object("a"),
                source: ResolutionSource::Table
            }
        );
    }

    #[test]
    fn multiplier_scales_and_floors() {
        let catalog = StaticCatalog::new().with_item(ItemDefinition::new("gold").with_value(10, 11));
        let gold = Identity::object("gold");
        assert_eq!(draw_magnitude(&catalog, &gold, 0.45, &PcgRng, 3), Some(4));
        assert_eq!(draw_magnitude(&catalog, &Identity::object("a"), 1.0, &PcgRng, 3), None);
    }
}
