//! Outcome tables and the resolver that draws from them.
//!
//! A table maps an [`Identity`] to one candidate list per converter setting.
//! Lists may repeat a candidate to weight it. Tables are built once at load
//! time and only read afterwards.
mod resolver;

pub use resolver::{OutcomeResolver, Resolution, ResolutionSource, draw_magnitude};

use core::fmt;
use std::collections::HashMap;

use crate::state::{ConverterSetting, Identity};

/// One entry of a candidate list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Candidate {
    /// Remove the entity, spawn nothing.
    Destroy,
    /// Replace with a fresh instance of the same identity.
    Same,
    Become(Identity),
}

impl Candidate {
    pub const DESTROY_TOKEN: &'static str = "*";
    pub const SAME_TOKEN: &'static str = "@";
    pub const HOSTILE_PREFIX: char = '!';
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Destroy => f.write_str(Self::DESTROY_TOKEN),
            Candidate::Same => f.write_str(Self::SAME_TOKEN),
            Candidate::Become(identity) => write!(f, "{identity}"),
        }
    }
}

/// Candidate lists indexed by [`ConverterSetting::index`].
pub type CandidateColumns = [Vec<Candidate>; ConverterSetting::COUNT];

/// Identity → per-setting candidate lists.
///
/// Every configured identity has a (possibly empty) list for every setting.
#[derive(Clone, Debug, Default)]
pub struct OutcomeTable {
    entries: HashMap<Identity, CandidateColumns>,
}

impl OutcomeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `candidates` to the list of `identity` under `setting`,
    /// creating empty lists for the other settings if needed.
    pub fn add(
        &mut self,
        identity: Identity,
        setting: ConverterSetting,
        candidates: impl IntoIterator<Item = Candidate>,
    ) {
        self.entries.entry(identity).or_default()[setting.index()].extend(candidates);
    }

    /// Merges a whole record into the table by concatenating each column.
    pub fn merge(&mut self, identity: Identity, columns: CandidateColumns) {
        let entry = self.entries.entry(identity).or_default();
        for (column, extra) in entry.iter_mut().zip(columns) {
            column.extend(extra);
        }
    }

    /// `None` when the identity has no record at all.
    pub fn candidates(&self, identity: &Identity, setting: ConverterSetting) -> Option<&[Candidate]> {
        self.entries
            .get(identity)
            .map(|columns| columns[setting.index()].as_slice())
    }

    pub fn is_configured(&self, identity: &Identity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Number of configured identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.entries.keys()
    }
}
