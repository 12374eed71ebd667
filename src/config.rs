//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::DEFAULT_MAX_RETRY;

/// Default backend quota: 5 Mi UTF-16 code units.
pub const DEFAULT_CAPACITY: usize = 5 * 1024 * 1024;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend quota in UTF-16 code units
    pub capacity: usize,
    /// Maximum evictions a single forced write may perform
    pub max_retry: usize,
    /// HTTP server port
    pub server_port: u16,
    /// Seconds between expiry sweeps
    pub sweep_interval: u64,
    /// Snapshot file; None keeps the cache in memory only
    pub data_file: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STORE_CAPACITY` - Backend quota in UTF-16 units (default: 5242880)
    /// - `MAX_RETRY` - Eviction budget per write (default: 15)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `DATA_FILE` - Snapshot path for a persistent backend (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: parse_var("STORE_CAPACITY").unwrap_or(defaults.capacity),
            max_retry: parse_var("MAX_RETRY").unwrap_or(defaults.max_retry),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            sweep_interval: parse_var("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            data_file: env::var("DATA_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_retry: DEFAULT_MAX_RETRY,
            server_port: 3000,
            sweep_interval: 60,
            data_file: None,
        }
    }
}
