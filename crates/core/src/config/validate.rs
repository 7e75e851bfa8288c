use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Queue concurrency and rate ceiling are not 0
/// - Cache TTL, per-tag cap and soft timeout are not 0
/// - An enabled proxy pool has at least one parseable endpoint
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.queue.max_concurrent == 0 {
        return Err(invalid("queue.max_concurrent cannot be 0"));
    }
    if config.queue.requests_per_minute == 0 {
        return Err(invalid("queue.requests_per_minute cannot be 0"));
    }

    if config.cache.ttl_hours == 0 {
        return Err(invalid("cache.ttl_hours cannot be 0"));
    }

    if config.search.max_per_tag == 0 {
        return Err(invalid("search.max_per_tag cannot be 0"));
    }
    if config.search.soft_timeout_ms == 0 {
        return Err(invalid("search.soft_timeout_ms cannot be 0"));
    }

    if config.proxy.enabled {
        if config.proxy.endpoints.is_empty() {
            return Err(invalid("proxy.enabled requires at least one endpoint"));
        }
        config
            .proxy
            .parse_endpoints()
            .map_err(|e| ConfigError::ValidationError(format!("proxy.endpoints: {}", e)))?;
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
