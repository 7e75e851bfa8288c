//! Egress proxy pool.
//!
//! Rotates round-robin over a fixed set of HTTP proxies, skipping endpoints
//! that recently failed. When every endpoint is flagged failed the pool
//! resets all flags and keeps serving instead of running dry.

mod config;
mod pool;
mod types;

pub use config::ProxyConfig;
pub use pool::ProxyPool;
pub use types::{EndpointStatus, PoolStats, ProxyCredentials, ProxyEndpoint, ProxyError};
