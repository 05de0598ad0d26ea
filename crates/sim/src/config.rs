//! Simulation configuration loaded from the environment.
use std::env;
use std::path::PathBuf;

use items_runtime::RuntimeConfig;

/// Settings for one scripted run.
#[derive(Clone, Debug, Default)]
pub struct SimConfig {
    pub runtime: RuntimeConfig,
    /// Catalog override; the bundled catalog is used when unset.
    pub catalog_path: Option<PathBuf>,
    pub enable_persistence: bool,
    pub log_dir: Option<PathBuf>,
}

impl SimConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `ITEMS_CATALOG` - Path to a RON item catalog (default: bundled catalog)
    /// - `ENABLE_PERSISTENCE` - Save stores after the run and restore them on start (default: false)
    /// - `ITEMS_LOG_DIR` - Also write logs to `items-sim.log` in this directory (default: stderr only)
    ///
    /// Runtime variables are documented on [`RuntimeConfig::from_env`].
    pub fn from_env() -> Self {
        let mut config = Self {
            runtime: RuntimeConfig::from_env(),
            ..Self::default()
        };

        config.catalog_path = env::var("ITEMS_CATALOG").ok().map(PathBuf::from);

        if let Some(enable) = read_env::<bool>("ENABLE_PERSISTENCE") {
            config.enable_persistence = enable;
        } else if env::var("ENABLE_PERSISTENCE").is_ok() {
            // A bare variable counts as "true".
            config.enable_persistence = true;
        }

        config.log_dir = env::var("ITEMS_LOG_DIR").ok().map(PathBuf::from);

        config
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.trim().parse().ok()
}
