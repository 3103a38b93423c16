//! Content factory for building device content from a data directory.

use std::path::{Path, PathBuf};

use device_core::{DeviceConfig, OutcomeTable, StaticCatalog};
use tracing::info;

use crate::loaders::{CatalogLoader, ConfigLoader, LoadResult, RecipeDiscovery, RecipeLoader};
use crate::recipe::RecipeSet;
use crate::table::{RecipeIssue, build_table};

/// Everything a host needs to run devices, loaded in one go.
#[derive(Debug)]
pub struct ContentBundle {
    pub catalog: StaticCatalog,
    pub table: OutcomeTable,
    pub config: DeviceConfig,
    /// Recipe problems found while building `table`.
    pub issues: Vec<RecipeIssue>,
}

/// Content factory that loads device content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── devices.toml
/// ├── catalog.ron
/// └── plugins/
///     └── <plugin>/
///         └── device-recipes/
///             └── *.json
/// ```
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load device tunables from `devices.toml`, or defaults when absent.
    pub fn load_config(&self) -> LoadResult<DeviceConfig> {
        let path = self.data_dir.join("devices.toml");
        if !path.exists() {
            return Ok(DeviceConfig::default());
        }
        ConfigLoader::load(&path)
    }

    /// Load the spawnable-identity catalog from `catalog.ron`.
    pub fn load_catalog(&self) -> LoadResult<StaticCatalog> {
        let path = self.data_dir.join("catalog.ron");
        CatalogLoader::load(&path)
    }

    /// Load and merge recipe files under `plugins/`.
    pub fn load_recipes(&self, include_default: bool) -> LoadResult<RecipeSet> {
        let discovery =
            RecipeDiscovery::new(self.data_dir.join("plugins")).include_default(include_default);
        RecipeLoader::load_all(&discovery)
    }

    /// Load catalog, config and recipes and build the outcome table.
    pub fn load_bundle(&self, include_default: bool) -> LoadResult<ContentBundle> {
        let catalog = self.load_catalog()?;
        let config = self.load_config()?;
        let recipes = self.load_recipes(include_default)?;
        let (table, issues) = build_table(&recipes, &catalog);
        info!(
            target: "content::recipes",
            identities = table.len(),
            issues = issues.len(),
            "outcome table built"
        );
        Ok(ContentBundle {
            catalog,
            table,
            config,
            issues,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use device_core::{ConverterSetting, Identity};

    use super::*;

    #[test]
    fn factory_paths() {
        let factory = ContentFactory::new("/tmp/data");
        assert_eq!(factory.data_dir(), Path::new("/tmp/data"));
    }

    #[test]
    fn bundle_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("catalog.ron"),
            r#"(items: [(key: "bolt"), (key: "airhorn")], hostiles: [])"#,
        )
        .unwrap();
        let recipes = dir.path().join("plugins/core/device-recipes");
        fs::create_dir_all(&recipes).unwrap();
        fs::write(
            recipes.join("default.json"),
            r#"[{"ItemName": "airhorn", "FineResults": ["bolt", "ghost"]},
                {"ItemName": "ghost", "RoughResults": ["*"]}]"#,
        )
        .unwrap();

        let bundle = ContentFactory::new(dir.path()).load_bundle(true).unwrap();
        assert_eq!(bundle.config, DeviceConfig::default());
        assert_eq!(bundle.table.len(), 1);
        assert_eq!(bundle.issues.len(), 2);
        assert_eq!(
            bundle
                .table
                .candidates(&Identity::object("airhorn"), ConverterSetting::Fine)
                .map(<[_]>::len),
            Some(1)
        );

        let without_default = ContentFactory::new(dir.path()).load_bundle(false).unwrap();
        assert!(without_default.table.is_empty());
    }

    #[test]
    fn shipped_data_is_consistent() {
        let data = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        let bundle = ContentFactory::new(data).load_bundle(true).unwrap();
        assert!(bundle.issues.is_empty(), "{:?}", bundle.issues);
        assert_eq!(bundle.config, DeviceConfig::default());
        assert!(bundle.table.is_configured(&Identity::hostile("hoarding bug")));
    }

    #[test]
    fn missing_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ContentFactory::new(dir.path()).load_bundle(true).is_err());
    }
}
