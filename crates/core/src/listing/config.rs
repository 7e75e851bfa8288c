//! Listing source configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the upstream subtitle listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Site root, also sent as `Referer`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Listing page request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Minimum spacing between listing requests (milliseconds).
    #[serde(default = "default_min_interval")]
    pub min_request_interval_ms: u64,

    /// User agent for listing requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Rows whose language badge lacks this marker are dropped.
    #[serde(default = "default_language_marker")]
    pub language_marker: String,

    /// Language code attached to results (ISO 639-2).
    #[serde(default = "default_result_language")]
    pub result_language: String,
}

fn default_base_url() -> String {
    "https://subs.ro".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_min_interval() -> u64 {
    1500
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 SubScout/{}",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_accept_language() -> String {
    "ro-RO,ro;q=0.9,en;q=0.8".to_string()
}

fn default_language_marker() -> String {
    "- ro".to_string()
}

fn default_result_language() -> String {
    "ron".to_string()
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            min_request_interval_ms: default_min_interval(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            language_marker: default_language_marker(),
            result_language: default_result_language(),
        }
    }
}

impl ListingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    /// Domain used for request pacing.
    pub fn domain(&self) -> &str {
        let rest = self
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.base_url);
        rest.split(['/', ':']).next().unwrap_or(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ListingConfig::default();
        assert_eq!(config.base_url, "https://subs.ro");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.min_request_interval(), Duration::from_millis(1500));
        assert_eq!(config.result_language, "ron");
        assert_eq!(config.domain(), "subs.ro");
    }

    #[test]
    fn test_domain_with_port() {
        let config = ListingConfig {
            base_url: "http://127.0.0.1:8080/root".to_string(),
            ..Default::default()
        };
        assert_eq!(config.domain(), "127.0.0.1");
    }
}
