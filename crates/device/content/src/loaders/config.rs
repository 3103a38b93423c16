//! Device configuration loader.

use std::path::Path;

use device_core::DeviceConfig;

use crate::loaders::{LoadResult, read_file};

/// Loader for device tunables from TOML files.
///
/// Every table and key is optional; anything left out keeps its default. A
/// `timings` table replaces the device's timings as a whole, so give all three
/// durations when overriding one.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &Path) -> LoadResult<DeviceConfig> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<DeviceConfig> {
        let config: DeviceConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse device config TOML: {}", e))?;

        Ok(config)
    }
}
