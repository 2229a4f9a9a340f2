//! Optional TOML configuration, `<data dir>/config.toml` unless a path is given.
//!
//! ```toml
//! [tracker]
//! idle_threshold_ms = 60000
//! tick_interval_ms = 1000
//! persist_interval_ms = 15000
//!
//! [frameworks]
//! demo = ["Django"]
//! ```

use std::{collections::BTreeMap, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tracker: TrackerSettings,
    /// Framework labels per workspace folder name.
    pub frameworks: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerSettings {
    /// Time without activity after which the user counts as idle.
    pub idle_threshold_ms: i64,
    pub tick_interval_ms: u64,
    pub persist_interval_ms: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            idle_threshold_ms: 60_000,
            tick_interval_ms: 1000,
            persist_interval_ms: 15_000,
        }
    }
}

impl TrackerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Config {
    /// Loads the config at `path`. A missing file means defaults, a broken one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {path:?}, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read config {path:?}")),
        };
        toml::from_str(&content).with_context(|| format!("Invalid config {path:?}"))
    }
}
