//! Content loaders for reading device data from files.
//!
//! Recipes are JSON so third-party packs can ship them; the catalog is RON
//! and the device tunables are TOML.

pub mod catalog;
pub mod config;
pub mod factory;
pub mod recipes;

pub use catalog::{CatalogFile, CatalogLoader};
pub use config::ConfigLoader;
pub use factory::{ContentBundle, ContentFactory};
pub use recipes::{RecipeDiscovery, RecipeLoader};

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
