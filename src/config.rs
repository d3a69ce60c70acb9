//! Configuration loaded from environment variables

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cache::{
    CacheConfig, FileStore, WritePolicy, DEFAULT_FETCH_TIMEOUT, DEFAULT_TTL,
};
use crate::data::events::DEFAULT_BASE_URL;

/// Errors in configuration values that cannot fall back to a default
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid STAFFCAL_WRITE_POLICY: {0}")]
    InvalidWritePolicy(String),
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the calendar backend
    pub api_url: String,
    /// How long a cached window is served without a foreground fetch
    pub cache_ttl: Duration,
    /// Upper bound on each backend call
    pub fetch_timeout: Duration,
    /// Ordering of concurrent writes to the same cache key
    pub write_policy: WritePolicy,
    /// Cache directory override; the XDG cache directory when `None`
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl: DEFAULT_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            write_policy: WritePolicy::default(),
            cache_dir: None,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Environment Variables
    /// - `STAFFCAL_API_URL` - Backend base URL (default: http://localhost:8000/api)
    /// - `STAFFCAL_CACHE_TTL_SECS` - Cache TTL in seconds (default: 300)
    /// - `STAFFCAL_FETCH_TIMEOUT_SECS` - Request timeout in seconds (default: 10)
    /// - `STAFFCAL_WRITE_POLICY` - `sequenced` or `last-write-wins` (default: sequenced)
    /// - `STAFFCAL_CACHE_DIR` - Cache directory (default: XDG cache dir)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration using `lookup` to resolve variable names
    ///
    /// Unparseable numbers fall back to their defaults; an unknown write
    /// policy is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| {
            lookup(name)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let write_policy = match lookup("STAFFCAL_WRITE_POLICY") {
            Some(raw) => raw.parse().map_err(ConfigError::InvalidWritePolicy)?,
            None => defaults.write_policy,
        };

        Ok(Self {
            api_url: lookup("STAFFCAL_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.api_url),
            cache_ttl: secs("STAFFCAL_CACHE_TTL_SECS", defaults.cache_ttl),
            fetch_timeout: secs("STAFFCAL_FETCH_TIMEOUT_SECS", defaults.fetch_timeout),
            write_policy,
            cache_dir: lookup("STAFFCAL_CACHE_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Cache settings derived from this configuration
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_ttl(self.cache_ttl)
            .with_fetch_timeout(self.fetch_timeout)
            .with_write_policy(self.write_policy)
    }

    /// On-disk store for the configured cache directory
    ///
    /// Returns `None` when no directory is configured and no XDG cache
    /// directory can be determined.
    pub fn file_store(&self) -> Option<FileStore> {
        match &self.cache_dir {
            Some(dir) => Some(FileStore::with_dir(dir.clone())),
            None => FileStore::new(),
        }
    }
}
