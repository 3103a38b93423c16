//! Recipe file discovery and loading.
//!
//! Recipe packs live under a plugin root:
//!
//! ```text
//! plugins/
//! ├── core/
//! │   └── device-recipes/
//! │       └── default.json
//! └── extra-scrap/
//!     └── device-recipes/
//!         ├── tools.json
//!         └── hostiles.json
//! ```
//!
//! Each file is a JSON array of [`RecipeRecord`]s. Files are visited in path
//! order so merged candidate lists are reproducible.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::loaders::{LoadResult, read_file};
use crate::recipe::{RecipeRecord, RecipeSet};

/// Finds recipe files under a plugin root.
#[derive(Clone, Debug)]
pub struct RecipeDiscovery {
    root: PathBuf,
    include_default: bool,
}

impl RecipeDiscovery {
    pub const DIRECTORY: &'static str = "device-recipes";
    pub const DEFAULT_FILE: &'static str = "default.json";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_default: true,
        }
    }

    /// Whether files named `default.json` are part of the result.
    #[must_use]
    pub fn include_default(mut self, include: bool) -> Self {
        self.include_default = include;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every matching recipe file, sorted by path.
    ///
    /// A missing root yields no files; an unreadable plugin directory is
    /// skipped with a warning.
    pub fn files(&self) -> LoadResult<Vec<PathBuf>> {
        if !self.root.is_dir() {
            debug!(target: "content::recipes", root = %self.root.display(), "no plugin root");
            return Ok(Vec::new());
        }

        let plugins = std::fs::read_dir(&self.root).map_err(|e| {
            anyhow::anyhow!("Failed to read plugin root {}: {}", self.root.display(), e)
        })?;

        let mut files = Vec::new();
        for plugin in plugins.flatten() {
            let dir = plugin.path().join(Self::DIRECTORY);
            if !dir.is_dir() {
                continue;
            }
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(error) => {
                    warn!(target: "content::recipes", dir = %dir.display(), %error, "recipe directory unreadable");
                    continue;
                }
            };
            files.extend(
                entries
                    .flatten()
                    .map(|entry| entry.path())
                    .filter(|path| self.accepts(path)),
            );
        }
        files.sort();
        Ok(files)
    }

    fn accepts(&self, path: &Path) -> bool {
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
            return false;
        }
        self.include_default
            || path
                .file_name()
                .is_none_or(|name| name != Self::DEFAULT_FILE)
    }
}

/// Loader for recipe records from JSON files.
pub struct RecipeLoader;

impl RecipeLoader {
    pub fn load_file(path: &Path) -> LoadResult<Vec<RecipeRecord>> {
        let content = read_file(path)?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse recipes at {}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> LoadResult<Vec<RecipeRecord>> {
        Ok(serde_json::from_str(content)?)
    }

    /// Loads and merges every discovered file.
    ///
    /// A file that cannot be read or parsed is logged and skipped.
    pub fn load_all(discovery: &RecipeDiscovery) -> LoadResult<RecipeSet> {
        let mut set = RecipeSet::new();
        for path in discovery.files()? {
            match Self::load_file(&path) {
                Ok(records) => {
                    debug!(target: "content::recipes", path = %path.display(), records = records.len(), "recipe file loaded");
                    set.extend(records);
                }
                Err(error) => {
                    warn!(target: "content::recipes", path = %path.display(), %error, "recipe file skipped");
                }
            }
        }
        info!(target: "content::recipes", identities = set.len(), "recipes merged");
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use device_core::ConverterSetting;
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, plugin: &str, file: &str, body: &str) {
        let dir = root.join(plugin).join(RecipeDiscovery::DIRECTORY);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), body).unwrap();
    }

    fn plugins() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "core",
            "default.json",
            r#"[{"ItemName": "Airhorn", "RoughResults": ["*"], "FineResults": ["bolt"]}]"#,
        );
        write(
            dir.path(),
            "extra",
            "tools.json",
            r#"[{"ItemName": "airhorn", "RoughResults": ["@"]}]"#,
        );
        write(dir.path(), "extra", "notes.txt", "not a recipe");
        dir
    }

    #[test]
    fn discovers_json_in_every_plugin() {
        let dir = plugins();
        let files = RecipeDiscovery::new(dir.path()).files().unwrap();
        assert_eq!(files.len(), 2);

        let without_default = RecipeDiscovery::new(dir.path())
            .include_default(false)
            .files()
            .unwrap();
        assert_eq!(without_default.len(), 1);
        assert!(without_default[0].ends_with("tools.json"));
    }

    #[test]
    fn merges_across_files_in_path_order() {
        let dir = plugins();
        let set = RecipeLoader::load_all(&RecipeDiscovery::new(dir.path())).unwrap();
        let record = set.get("airhorn").unwrap();
        assert_eq!(record.column(ConverterSetting::Rough), ["*", "@"]);
        assert_eq!(record.column(ConverterSetting::Fine), ["bolt"]);
        assert!(record.column(ConverterSetting::VeryFine).is_empty());
    }

    #[test]
    fn bad_file_is_skipped() {
        let dir = plugins();
        write(dir.path(), "broken", "bad.json", "{ not json");
        let set = RecipeLoader::load_all(&RecipeDiscovery::new(dir.path())).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = RecipeDiscovery::new(dir.path().join("nowhere"));
        assert!(RecipeLoader::load_all(&discovery).unwrap().is_empty());
    }
}
