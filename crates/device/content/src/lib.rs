//! Data-driven device content and loaders.
//!
//! This crate turns authored data into the inputs the device core consumes:
//! - Recipe records, merged across plugin packs (JSON)
//! - The spawnable-identity catalog (RON)
//! - Device tunables (TOML)
//!
//! [`build_table`] validates merged records against a catalog and produces the
//! `OutcomeTable` the converter resolves against.

pub mod recipe;
pub mod table;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use recipe::{RecipeRecord, RecipeSet};
pub use table::{RecipeIssue, TableBuilder, build_table, parse_identity};

#[cfg(feature = "loaders")]
pub use loaders::{
    CatalogFile, CatalogLoader, ConfigLoader, ContentBundle, ContentFactory, LoadResult,
    RecipeDiscovery, RecipeLoader,
};
