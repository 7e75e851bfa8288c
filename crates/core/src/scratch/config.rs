//! Scratch janitor configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the scratch directory and its janitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchConfig {
    /// Directory for in-progress archives and extracted subtitles.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Files older than this are deleted (hours).
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// Size cap for the whole directory (megabytes).
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Seconds between janitor sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_retention_hours() -> u64 {
    48
}

fn default_max_size_mb() -> u64 {
    1000
}

fn default_sweep_interval() -> u64 {
    6 * 3600
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            retention_hours: default_retention_hours(),
            max_size_mb: default_max_size_mb(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl ScratchConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
