//! Search orchestration configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the search orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Time a caller waits before getting an empty answer (milliseconds).
    /// The search keeps running in the background and fills the cache.
    #[serde(default = "default_soft_timeout")]
    pub soft_timeout_ms: u64,

    /// Stop acquiring after this many failed candidates in a row.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Stop acquiring after this many failed candidates overall.
    #[serde(default = "default_max_total_failures")]
    pub max_total_failures: u32,

    /// Candidates acquired together; 0 uses the queue's concurrency.
    #[serde(default)]
    pub batch_size: usize,

    /// Pause between batches (milliseconds).
    #[serde(default = "default_batch_delay")]
    pub batch_delay_ms: u64,

    /// Base URL under which extracted files are served.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Results kept per quality tag.
    #[serde(default = "default_max_per_tag")]
    pub max_per_tag: usize,

    /// Browser user agents rotated across archive downloads.
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

fn default_soft_timeout() -> u64 {
    4500
}

fn default_max_consecutive_failures() -> u32 {
    10
}

fn default_max_total_failures() -> u32 {
    20
}

fn default_batch_delay() -> u64 {
    1000
}

fn default_public_url() -> String {
    "http://localhost:7000".to_string()
}

fn default_max_per_tag() -> usize {
    15
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/120.0.0.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            soft_timeout_ms: default_soft_timeout(),
            max_consecutive_failures: default_max_consecutive_failures(),
            max_total_failures: default_max_total_failures(),
            batch_size: 0,
            batch_delay_ms: default_batch_delay(),
            public_url: default_public_url(),
            max_per_tag: default_max_per_tag(),
            user_agents: default_user_agents(),
        }
    }
}

impl SearchConfig {
    pub fn soft_timeout(&self) -> Duration {
        Duration::from_millis(self.soft_timeout_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// User agent for the `index`-th candidate.
    pub fn user_agent(&self, index: usize) -> Option<&str> {
        if self.user_agents.is_empty() {
            None
        } else {
            Some(&self.user_agents[index % self.user_agents.len()])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.soft_timeout(), Duration::from_millis(4500));
        assert_eq!(config.max_consecutive_failures, 10);
        assert_eq!(config.max_total_failures, 20);
        assert_eq!(config.batch_size, 0);
        assert_eq!(config.max_per_tag, 15);
        assert_eq!(config.user_agents.len(), 8);
    }

    #[test]
    fn test_user_agent_rotation() {
        let config = SearchConfig {
            user_agents: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        assert_eq!(config.user_agent(0), Some("a"));
        assert_eq!(config.user_agent(3), Some("b"));

        let none = SearchConfig {
            user_agents: vec![],
            ..Default::default()
        };
        assert_eq!(none.user_agent(1), None);
    }
}
