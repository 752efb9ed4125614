//! Guard configuration

use crate::error::{AccessError, Result};
use crate::separation::SeparationPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level guard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Conflicting role pairs
    #[serde(default)]
    pub separation: SeparationPolicy,

    /// Permission resolver settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Collect decision metrics
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,
}

impl AccessConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.separation.validate()?;
        self.resolver.validate()
    }
}

/// Permission resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Cache resolved permission sets per role
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// Upper bound on the age of a cached resolution
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached roles
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Extra attempts when the role graph changes during a load
    #[serde(default = "default_snapshot_retries")]
    pub snapshot_retries: usize,
}

impl ResolverConfig {
    /// Cache TTL as a duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Disable caching
    pub fn uncached() -> Self {
        Self {
            cache_enabled: false,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.cache_enabled && self.cache_capacity == 0 {
            return Err(AccessError::InvalidConfig(
                "resolver.cache_capacity must be positive when the cache is enabled".to_string(),
            ));
        }
        if self.cache_enabled && self.cache_ttl_secs == 0 {
            return Err(AccessError::InvalidConfig(
                "resolver.cache_ttl_secs must be positive when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_cache_enabled(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            snapshot_retries: default_snapshot_retries(),
        }
    }
}

fn default_enable_metrics() -> bool {
    true
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    1_000
}

fn default_snapshot_retries() -> usize {
    3
}
