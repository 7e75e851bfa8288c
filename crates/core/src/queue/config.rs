//! Acquisition queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the acquisition queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum jobs running at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum request starts per rolling minute, across all domains.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Floor for the per-domain spacing between request starts (milliseconds).
    #[serde(default = "default_min_request_delay")]
    pub min_request_delay_ms: u64,

    /// Ceiling for the per-domain spacing (milliseconds).
    #[serde(default = "default_max_domain_delay")]
    pub max_domain_delay_ms: u64,

    /// Base delay for throttle retries (milliseconds).
    #[serde(default = "default_retry_base")]
    pub retry_base_ms: u64,

    /// Retries allowed after a throttling response.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound of a single backoff delay (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Maximum random jitter added to each backoff (milliseconds).
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

fn default_max_concurrent() -> usize {
    2
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_min_request_delay() -> u64 {
    500
}

fn default_max_domain_delay() -> u64 {
    10_000
}

fn default_retry_base() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_jitter() -> u64 {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            requests_per_minute: default_requests_per_minute(),
            min_request_delay_ms: default_min_request_delay(),
            max_domain_delay_ms: default_max_domain_delay(),
            retry_base_ms: default_retry_base(),
            max_retries: default_max_retries(),
            max_backoff_ms: default_max_backoff(),
            jitter_ms: default_jitter(),
        }
    }
}

impl QueueConfig {
    pub fn min_request_delay(&self) -> Duration {
        Duration::from_millis(self.min_request_delay_ms)
    }

    pub fn max_domain_delay(&self) -> Duration {
        Duration::from_millis(self.max_domain_delay_ms)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}
