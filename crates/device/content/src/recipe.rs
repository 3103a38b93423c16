//! Raw recipe records as authored in data files.

use std::collections::BTreeMap;

use device_core::ConverterSetting;

/// One authored record: an input identity and one candidate list per setting.
///
/// Candidate strings use `*` for destroy, `@` for same identity and a
/// leading `!` for hostile identities. The input name takes the `!` prefix
/// too when it names a hostile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct RecipeRecord {
    pub item_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rough_results: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub coarse_results: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub one_to_one_results: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub fine_results: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub very_fine_results: Vec<String>,
}

impl RecipeRecord {
    pub fn new(item_name: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with(mut self, setting: ConverterSetting, candidates: &[&str]) -> Self {
        self.column_mut(setting)
            .extend(candidates.iter().map(|c| (*c).to_owned()));
        self
    }

    pub fn column(&self, setting: ConverterSetting) -> &[String] {
        match setting {
            ConverterSetting::Rough => &self.rough_results,
            ConverterSetting::Coarse => &self.coarse_results,
            ConverterSetting::OneToOne => &self.one_to_one_results,
            ConverterSetting::Fine => &self.fine_results,
            ConverterSetting::VeryFine => &self.very_fine_results,
        }
    }

    fn column_mut(&mut self, setting: ConverterSetting) -> &mut Vec<String> {
        match setting {
            ConverterSetting::Rough => &mut self.rough_results,
            ConverterSetting::Coarse => &mut self.coarse_results,
            ConverterSetting::OneToOne => &mut self.one_to_one_results,
            ConverterSetting::Fine => &mut self.fine_results,
            ConverterSetting::VeryFine => &mut self.very_fine_results,
        }
    }

    /// Lower-cased, trimmed input name used as the merge key.
    pub fn key(&self) -> String {
        self.item_name.trim().to_lowercase()
    }

    /// Appends every column of `other` to the matching column of `self`.
    pub fn absorb(&mut self, other: RecipeRecord) {
        for setting in [
            ConverterSetting::Rough,
            ConverterSetting::Coarse,
            ConverterSetting::OneToOne,
            ConverterSetting::Fine,
            ConverterSetting::VeryFine,
        ] {
            self.column_mut(setting)
                .extend(other.column(setting).iter().cloned());
        }
    }
}

/// Records merged by key, in key order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecipeSet {
    records: BTreeMap<String, RecipeRecord>,
}

impl RecipeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, concatenating its lists onto any existing record with
    /// the same (case-insensitive) key.
    pub fn merge(&mut self, record: RecipeRecord) {
        let key = record.key();
        match self.records.get_mut(&key) {
            Some(existing) => existing.absorb(record),
            None => {
                let mut record = record;
                record.item_name = key.clone();
                self.records.insert(key, record);
            }
        }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = RecipeRecord>) {
        for record in records {
            self.merge(record);
        }
    }

    pub fn get(&self, key: &str) -> Option<&RecipeRecord> {
        self.records.get(&key.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecipeRecord> {
        self.records.values()
    }
}
