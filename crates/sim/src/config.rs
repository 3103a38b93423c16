//! Simulation settings read from the process environment.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use runtime::RuntimeConfig;

/// Everything the headless session needs before it starts.
#[derive(Clone, Debug)]
pub struct SimConfig {
    pub content_dir: PathBuf,
    pub include_default_recipes: bool,
    pub seed: u64,
    pub log_dir: Option<PathBuf>,
    pub runtime: RuntimeConfig,
}

impl SimConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `DEVICE_CONTENT_DIR` - Catalog, tunables and recipe plugins (default: shipped data)
    /// - `DEVICE_LOAD_DEFAULT_RECIPES` - Merge `default.json` files (default: true)
    /// - `DEVICE_SEED` - Session seed (default: random)
    /// - `DEVICE_LOG_DIR` - Also write `sim.log` here; `default` picks the platform cache dir
    /// - `DEVICE_TICK_MS` - Scheduler period in milliseconds (default: 50)
    /// - `DEVICE_EVENT_BUFFER` - Broadcast capacity per topic (default: 256)
    pub fn from_env() -> Self {
        let mut runtime = RuntimeConfig::default();
        if let Some(ms) = read_env::<u64>("DEVICE_TICK_MS") {
            runtime.tick_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(capacity) = read_env::<usize>("DEVICE_EVENT_BUFFER") {
            runtime.event_buffer_size = capacity.max(1);
        }

        let log_dir = env::var("DEVICE_LOG_DIR").ok().map(|dir| {
            if dir == "default" {
                default_log_dir()
            } else {
                PathBuf::from(dir)
            }
        });

        Self {
            content_dir: env::var("DEVICE_CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| shipped_content_dir()),
            include_default_recipes: read_env("DEVICE_LOAD_DEFAULT_RECIPES").unwrap_or(true),
            seed: read_env("DEVICE_SEED").unwrap_or_else(rand::random),
            log_dir,
            runtime,
        }
    }
}

fn shipped_content_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../device/content/data")
}

/// Platform cache directory, e.g. `~/.cache/devices/logs` on Linux.
fn default_log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "devices")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp/devices"))
        .join("logs")
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
