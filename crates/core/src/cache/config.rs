//! Result cache configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the on-disk result cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Disable to always search upstream.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Directory holding one JSON file per cache key.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Lifetime of an entry (hours).
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// Interval between background sweeps (seconds).
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_secs: u64,

    /// Search the next few episodes in the background after an episode search.
    #[serde(default = "default_preload_enabled")]
    pub preload_enabled: bool,

    /// How many upcoming episodes to preload.
    #[serde(default = "default_preload_count")]
    pub preload_count: u32,

    /// Pause between preloaded episodes (milliseconds).
    #[serde(default = "default_preload_delay")]
    pub preload_delay_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_dir() -> PathBuf {
    PathBuf::from("cache/series")
}

fn default_ttl_hours() -> u64 {
    720
}

fn default_maintenance_interval() -> u64 {
    6 * 60 * 60
}

fn default_preload_enabled() -> bool {
    true
}

fn default_preload_count() -> u32 {
    3
}

fn default_preload_delay() -> u64 {
    5000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            dir: default_dir(),
            ttl_hours: default_ttl_hours(),
            maintenance_interval_secs: default_maintenance_interval(),
            preload_enabled: default_preload_enabled(),
            preload_count: default_preload_count(),
            preload_delay_ms: default_preload_delay(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours as i64)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    pub fn preload_delay(&self) -> Duration {
        Duration::from_millis(self.preload_delay_ms)
    }
}
