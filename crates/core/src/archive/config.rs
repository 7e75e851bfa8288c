//! Extraction configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for archive download and extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Extract ZIP members while the archive is still downloading.
    /// When disabled, ZIP archives are extracted after the download completes.
    #[serde(default = "default_progressive")]
    pub progressive: bool,

    /// How often the partially written archive is re-checked (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Maximum time spent extracting once the format is known (seconds).
    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,

    /// Archive download timeout (seconds).
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

fn default_progressive() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    500
}

fn default_extraction_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    60
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            progressive: default_progressive(),
            poll_interval_ms: default_poll_interval(),
            extraction_timeout_secs: default_extraction_timeout(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl ExtractionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractionConfig::default();
        assert!(config.progressive);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.extraction_timeout(), Duration::from_secs(30));
        assert_eq!(config.download_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_deserialize_traditional_mode() {
        let toml = r#"
            progressive = false
            download_timeout_secs = 30
        "#;
        let config: ExtractionConfig = toml::from_str(toml).unwrap();
        assert!(!config.progressive);
        assert_eq!(config.download_timeout_secs, 30);
        assert_eq!(config.poll_interval_ms, 500);
    }
}
