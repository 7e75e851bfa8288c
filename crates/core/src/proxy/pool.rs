//! Round-robin proxy pool with failure tracking.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::types::{EndpointStatus, PoolStats, ProxyEndpoint, ProxyError};
use super::ProxyConfig;
use crate::metrics;

#[derive(Debug, Default, Clone)]
struct ProxyHealth {
    failed: bool,
    successes: u64,
    failures: u64,
}

#[derive(Debug)]
struct PoolState {
    cursor: usize,
    health: Vec<ProxyHealth>,
    last_refresh: DateTime<Utc>,
}

/// Pool of egress proxies.
///
/// Health state is shared by every in-flight download; all reads and
/// updates happen under one lock so concurrent reports never get lost.
#[derive(Debug)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    state: Mutex<PoolState>,
}

impl ProxyPool {
    /// Create a pool over a fixed set of endpoints.
    ///
    /// An empty set is a configuration error.
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Result<Self, ProxyError> {
        if endpoints.is_empty() {
            return Err(ProxyError::PoolExhausted);
        }

        info!("Proxy pool initialized with {} endpoints", endpoints.len());

        let health = vec![ProxyHealth::default(); endpoints.len()];
        Ok(Self {
            endpoints,
            state: Mutex::new(PoolState {
                cursor: 0,
                health,
                last_refresh: Utc::now(),
            }),
        })
    }

    /// Build a pool from configuration; `None` when proxies are disabled.
    pub fn from_config(config: &ProxyConfig) -> Result<Option<Self>, ProxyError> {
        if !config.enabled {
            return Ok(None);
        }
        Self::new(config.parse_endpoints()?).map(Some)
    }

    /// Number of endpoints in the pool.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Next healthy endpoint in rotation.
    ///
    /// The cursor advances past skipped endpoints. If every endpoint is
    /// flagged failed, all flags are cleared and rotation continues.
    pub fn next(&self) -> ProxyEndpoint {
        let mut state = self.state.lock().unwrap();
        let total = self.endpoints.len();

        for _ in 0..total {
            let idx = state.cursor;
            state.cursor = (state.cursor + 1) % total;
            if !state.health[idx].failed {
                debug!(proxy = %self.endpoints[idx].address(), "Selected proxy");
                return self.endpoints[idx].clone();
            }
        }

        warn!(
            "All {} proxies marked failed, resetting failure flags",
            total
        );
        for health in state.health.iter_mut() {
            health.failed = false;
        }
        state.last_refresh = Utc::now();
        metrics::PROXY_RESETS.inc();

        let idx = state.cursor;
        state.cursor = (state.cursor + 1) % total;
        self.endpoints[idx].clone()
    }

    /// Flag an endpoint as failed so rotation skips it.
    pub fn mark_failed(&self, endpoint: &ProxyEndpoint) {
        let mut state = self.state.lock().unwrap();
        let Some(idx) = self.position(endpoint) else {
            return;
        };

        let health = &mut state.health[idx];
        health.failed = true;
        health.failures += 1;
        metrics::PROXY_FAILURES.inc();
        warn!(
            proxy = %endpoint.address(),
            failures = health.failures,
            "Proxy marked as failed"
        );

        let failed = state.health.iter().filter(|h| h.failed).count();
        if failed * 2 >= self.endpoints.len() {
            warn!(
                "{}/{} proxies currently marked failed",
                failed,
                self.endpoints.len()
            );
        }
    }

    /// Record a success; clears the endpoint's failed flag.
    pub fn mark_succeeded(&self, endpoint: &ProxyEndpoint) {
        let mut state = self.state.lock().unwrap();
        let Some(idx) = self.position(endpoint) else {
            return;
        };

        let health = &mut state.health[idx];
        if health.failed {
            debug!(proxy = %endpoint.address(), "Proxy recovered");
        }
        health.failed = false;
        health.successes += 1;
    }

    /// Aggregate health of the pool.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock().unwrap();
        PoolStats {
            total: self.endpoints.len(),
            failed: state.health.iter().filter(|h| h.failed).count(),
            last_refresh: state.last_refresh,
        }
    }

    /// Per-endpoint health, in pool order.
    pub fn endpoint_status(&self) -> Vec<EndpointStatus> {
        let state = self.state.lock().unwrap();
        self.endpoints
            .iter()
            .zip(state.health.iter())
            .map(|(endpoint, health)| EndpointStatus {
                address: endpoint.address(),
                failed: health.failed,
                successes: health.successes,
                failures: health.failures,
            })
            .collect()
    }

    fn position(&self, endpoint: &ProxyEndpoint) -> Option<usize> {
        self.endpoints.iter().position(|e| e == endpoint)
    }
}
