//! Configuration Module
//!
//! Loads cache and node settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Cache and node configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries held by the local tier
    pub local_capacity: usize,
    /// Retention of entries in the local tier
    pub local_ttl: Duration,
    /// Retention used when an item does not carry its own TTL
    pub default_ttl: Duration,
    /// Number of shards for the local tier and the in-flight table
    pub shards: usize,
    /// Interval between expired-entry sweeps
    pub sweep_interval: Duration,
    /// HTTP port of the cache node
    pub server_port: u16,
    /// Whether the orchestrator keeps hit/miss counters
    pub stats_enabled: bool,
    /// Base URL of a cache node used as the remote tier
    pub remote_url: Option<String>,
}

/// Reads `name` and parses it, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `LOCAL_CAPACITY` - Local tier entry limit (default: 10000)
    /// - `LOCAL_TTL_MS` - Local tier retention in milliseconds (default: 60000)
    /// - `DEFAULT_TTL` - Default item TTL in seconds (default: 3600)
    /// - `SHARDS` - Shard count (default: 16)
    /// - `SWEEP_INTERVAL_MS` - Sweep frequency in milliseconds (default: 1000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `STATS_ENABLED` - Keep hit/miss counters (default: true)
    /// - `REMOTE_URL` - Cache node base URL (default: unset, local-only)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            local_capacity: env_or("LOCAL_CAPACITY", defaults.local_capacity),
            local_ttl: Duration::from_millis(env_or(
                "LOCAL_TTL_MS",
                defaults.local_ttl.as_millis() as u64,
            )),
            default_ttl: Duration::from_secs(env_or("DEFAULT_TTL", defaults.default_ttl.as_secs())),
            shards: env_or("SHARDS", defaults.shards),
            sweep_interval: Duration::from_millis(env_or(
                "SWEEP_INTERVAL_MS",
                defaults.sweep_interval.as_millis() as u64,
            )),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            stats_enabled: env_or("STATS_ENABLED", defaults.stats_enabled),
            remote_url: env::var("REMOTE_URL").ok().filter(|url| !url.trim().is_empty()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_capacity: 10_000,
            local_ttl: Duration::from_secs(60),
            default_ttl: Duration::from_secs(3600),
            shards: 16,
            sweep_interval: Duration::from_secs(1),
            server_port: 3000,
            stats_enabled: true,
            remote_url: None,
        }
    }
}
