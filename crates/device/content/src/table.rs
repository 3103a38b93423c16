//! Turns merged recipe records into an [`OutcomeTable`].
//!
//! Configuration problems never fail the build: each one is collected as a
//! [`RecipeIssue`], logged, and the offending record or candidate is skipped.

use device_core::{Candidate, CandidateColumns, Catalog, ConverterSetting, Identity, OutcomeTable};
use tracing::{debug, warn};

use crate::recipe::{RecipeRecord, RecipeSet};

/// A configuration problem found while building the table.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecipeIssue {
    #[error("recipe input {input} is not in the catalog; record skipped")]
    UnknownSource { input: String },

    #[error("recipe input is empty; record skipped")]
    EmptySource,

    #[error("{input} ({setting}): unknown target {target}; candidate skipped")]
    UnknownTarget {
        input: String,
        setting: ConverterSetting,
        target: String,
    },

    #[error("{input} ({setting}): unknown hostile target {target}; converting to itself")]
    UnknownHostileTarget {
        input: String,
        setting: ConverterSetting,
        target: String,
    },

    #[error("{input} ({setting}): empty candidate skipped")]
    EmptyCandidate {
        input: String,
        setting: ConverterSetting,
    },
}

/// Parses a recipe name: a leading `!` marks a hostile identity.
pub fn parse_identity(raw: &str) -> Option<Identity> {
    let raw = raw.trim();
    let identity = match raw.strip_prefix(Candidate::HOSTILE_PREFIX) {
        Some(hostile) if !hostile.trim().is_empty() => Identity::hostile(hostile),
        Some(_) => return None,
        None if raw.is_empty() => return None,
        None => Identity::object(raw),
    };
    Some(identity)
}

/// Builds outcome tables against a catalog.
pub struct TableBuilder<'a> {
    catalog: &'a dyn Catalog,
    table: OutcomeTable,
    issues: Vec<RecipeIssue>,
}

impl<'a> TableBuilder<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            table: OutcomeTable::new(),
            issues: Vec::new(),
        }
    }

    pub fn add_set(&mut self, set: &RecipeSet) {
        for record in set.iter() {
            self.add_record(record);
        }
    }

    pub fn add_record(&mut self, record: &RecipeRecord) {
        let input = record.key();
        let Some(source) = parse_identity(&input) else {
            self.report(RecipeIssue::EmptySource);
            return;
        };
        if !self.catalog.contains(&source) {
            self.report(RecipeIssue::UnknownSource { input });
            return;
        }

        let mut columns = CandidateColumns::default();
        for (index, column) in columns.iter_mut().enumerate() {
            let Some(setting) = ConverterSetting::from_index(index) else {
                continue;
            };
            for raw in record.column(setting) {
                if let Some(candidate) = self.candidate(&input, &source, setting, raw) {
                    column.push(candidate);
                }
            }
        }
        debug!(target: "content::recipes", %source, "recipe added");
        self.table.merge(source, columns);
    }

    fn candidate(
        &mut self,
        input: &str,
        source: &Identity,
        setting: ConverterSetting,
        raw: &str,
    ) -> Option<Candidate> {
        let raw = raw.trim();
        match raw {
            Candidate::DESTROY_TOKEN => return Some(Candidate::Destroy),
            Candidate::SAME_TOKEN => return Some(Candidate::Same),
            _ => {}
        }
        let Some(target) = parse_identity(raw) else {
            self.report(RecipeIssue::EmptyCandidate {
                input: input.to_owned(),
                setting,
            });
            return None;
        };
        if self.catalog.contains(&target) {
            return Some(Candidate::Become(target));
        }

        match (&target, source) {
            (Identity::Hostile(_), Identity::Hostile(_)) => {
                self.report(RecipeIssue::UnknownHostileTarget {
                    input: input.to_owned(),
                    setting,
                    target: raw.to_owned(),
                });
                Some(Candidate::Same)
            }
            _ => {
                self.report(RecipeIssue::UnknownTarget {
                    input: input.to_owned(),
                    setting,
                    target: raw.to_owned(),
                });
                None
            }
        }
    }

    fn report(&mut self, issue: RecipeIssue) {
        warn!(target: "content::recipes", %issue, "recipe problem");
        self.issues.push(issue);
    }

    pub fn finish(self) -> (OutcomeTable, Vec<RecipeIssue>) {
        (self.table, self.issues)
    }
}

/// Builds a table from `set`, returning it with every issue found.
pub fn build_table(set: &RecipeSet, catalog: &dyn Catalog) -> (OutcomeTable, Vec<RecipeIssue>) {
    let mut builder = TableBuilder::new(catalog);
    builder.add_set(set);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use device_core::{HostileDefinition, ItemDefinition, StaticCatalog};

    use super::*;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_item(ItemDefinition::new("bolt"))
            .with_item(ItemDefinition::new("airhorn"))
            .with_hostile(HostileDefinition::new("crawler"))
            .with_hostile(HostileDefinition::new("flowerman"))
    }

    fn set(records: impl IntoIterator<Item = RecipeRecord>) -> RecipeSet {
        let mut set = RecipeSet::new();
        set.extend(records);
        set
    }

    #[test]
    fn sentinels_and_prefixes_parse() {
        let recipes = set([RecipeRecord::new("Airhorn").with(
            ConverterSetting::Rough,
            &["*", "@", "bolt", "!crawler"],
        )]);
        let (table, issues) = build_table(&recipes, &catalog());
        assert!(issues.is_empty());
        assert_eq!(
            table.candidates(&Identity::object("airhorn"), ConverterSetting::Rough),
            Some(
                &[
                    Candidate::Destroy,
                    Candidate::Same,
                    Candidate::Become(Identity::object("bolt")),
                    Candidate::Become(Identity::hostile("crawler")),
                ][..]
            )
        );
    }

    #[test]
    fn unknown_source_skips_record() {
        let recipes = set([
            RecipeRecord::new("ghost").with(ConverterSetting::Rough, &["*"]),
            RecipeRecord::new("bolt").with(ConverterSetting::Fine, &["airhorn"]),
        ]);
        let (table, issues) = build_table(&recipes, &catalog());
        assert_eq!(table.len(), 1);
        assert_eq!(
            issues,
            vec![RecipeIssue::UnknownSource {
                input: "ghost".to_owned()
            }]
        );
    }

    #[test]
    fn unknown_targets_depend_on_source_kind() {
        let recipes = set([
            RecipeRecord::new("!crawler").with(ConverterSetting::Fine, &["!nobody"]),
            RecipeRecord::new("bolt").with(ConverterSetting::Fine, &["!nobody", "nothing"]),
        ]);
        let (table, issues) = build_table(&recipes, &catalog());
        assert_eq!(issues.len(), 3);
        assert_eq!(
            table.candidates(&Identity::hostile("crawler"), ConverterSetting::Fine),
            Some(&[Candidate::Same][..])
        );
        assert_eq!(
            table.candidates(&Identity::object("bolt"), ConverterSetting::Fine),
            Some(&[][..])
        );
    }

    #[test]
    fn configured_identity_has_every_column() {
        let recipes = set([RecipeRecord::new("bolt").with(ConverterSetting::VeryFine, &["@"])]);
        let (table, _) = build_table(&recipes, &catalog());
        assert_eq!(
            table.candidates(&Identity::object("bolt"), ConverterSetting::Coarse),
            Some(&[][..])
        );
    }
}
