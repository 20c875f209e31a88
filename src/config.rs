//! Runtime configuration
//!
//! One flat struct covering locks, memory, caching and traversal limits.
//! Every field has a default, so a partial JSON file (or none at all)
//! yields a working configuration.

use crate::cache::{CacheConfig, InvalidationRule};
use crate::memory::EvictionStrategy;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Default per-entity lock wait, milliseconds
    pub lock_timeout_ms: u64,

    /// Resident-node ceiling; 0 disables enforcement
    pub memory_ceiling: usize,
    pub eviction_strategy: EvictionStrategy,

    /// Fast-tier (relationship list) cache entries
    pub fast_cache_capacity: usize,
    /// Query-tier (analysis result) cache entries
    pub query_cache_capacity: usize,
    pub query_cache_ttl_secs: u64,
    pub invalidation_rule: InvalidationRule,

    /// Upper bound on nodes visited in one traversal before truncation
    pub traversal_visit_cap: usize,
    /// Default hop radius for impact propagation
    pub default_max_hops: usize,
    /// Depth bound for pathway enumeration
    pub pathway_max_depth: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            lock_timeout_ms: 10_000,
            memory_ceiling: 0,
            eviction_strategy: EvictionStrategy::Lru,
            fast_cache_capacity: 10_000,
            query_cache_capacity: 1_000,
            query_cache_ttl_secs: 300,
            invalidation_rule: InvalidationRule::Dependents,
            traversal_visit_cap: 100_000,
            default_max_hops: 3,
            pathway_max_depth: 8,
        }
    }
}

impl GraphConfig {
    /// Load from a JSON file; missing fields fall back to defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: GraphConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "fast_cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.traversal_visit_cap == 0 {
            return Err(ConfigError::Invalid(
                "traversal_visit_cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            fast_capacity: NonZeroUsize::new(self.fast_cache_capacity.max(1)).unwrap(),
            query_capacity: self.query_cache_capacity,
            query_ttl: Duration::from_secs(self.query_cache_ttl_secs),
            rule: self.invalidation_rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = GraphConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"memory_ceiling": 500, "default_max_hops": 5}}"#).unwrap();

        let config = GraphConfig::from_file(file.path()).unwrap();
        assert_eq!(config.memory_ceiling, 500);
        assert_eq!(config.default_max_hops, 5);
        // Untouched fields keep defaults
        assert_eq!(config.query_cache_capacity, 1_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"fast_cache_capacity": 0}}"#).unwrap();
        assert!(matches!(
            GraphConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
