//! Configuration for the session manager
//!
//! Provides [`ManagerConfig`] with builder-style setters and parameter
//! validation, following a validate-then-build pattern.

use crate::error::SearchdexError;
use serde::{Deserialize, Serialize};

/// Minimum writer heap tantivy will accept for a single indexing thread
const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

/// Configuration for a [`SearchManager`](crate::manager::SearchManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Heap budget for each index writer, in bytes
    pub writer_heap_bytes: usize,
    /// Maximum number of engine operations executing concurrently
    pub max_concurrent_tasks: usize,
    /// Upper bound on the number of hits a single search collects
    pub max_search_hits: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            writer_heap_bytes: 50_000_000,
            max_concurrent_tasks: 8,
            max_search_hits: 10_000,
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the writer heap budget in bytes
    pub fn writer_heap_bytes(mut self, bytes: usize) -> Self {
        self.writer_heap_bytes = bytes;
        self
    }

    /// Set the maximum number of concurrently executing engine operations
    pub fn max_concurrent_tasks(mut self, tasks: usize) -> Self {
        self.max_concurrent_tasks = tasks;
        self
    }

    /// Set the per-search hit collection limit
    pub fn max_search_hits(mut self, hits: usize) -> Self {
        self.max_search_hits = hits;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SearchdexError> {
        if self.writer_heap_bytes < MIN_WRITER_HEAP_BYTES {
            return Err(SearchdexError::config_error(
                "writer_heap_bytes",
                format!(
                    "must be at least {} bytes, got {}",
                    MIN_WRITER_HEAP_BYTES, self.writer_heap_bytes
                ),
            ));
        }

        if self.max_concurrent_tasks == 0 {
            return Err(SearchdexError::config_error(
                "max_concurrent_tasks",
                "must be greater than 0",
            ));
        }

        if self.max_search_hits == 0 {
            return Err(SearchdexError::config_error(
                "max_search_hits",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Build the configuration after validation
    pub fn build(self) -> Result<Self, SearchdexError> {
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ManagerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ManagerConfig::new()
            .writer_heap_bytes(64_000_000)
            .max_concurrent_tasks(4)
            .max_search_hits(500);

        assert_eq!(config.writer_heap_bytes, 64_000_000);
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.max_search_hits, 500);
        assert!(config.build().is_ok());
    }

    #[test]
    fn test_writer_heap_too_small() {
        let config = ManagerConfig::new().writer_heap_bytes(1_000_000);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SearchdexError::Config { .. }));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = ManagerConfig::new().max_concurrent_tasks(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_hit_limit_rejected() {
        let config = ManagerConfig::new().max_search_hits(0);
        assert!(config.validate().is_err());
    }
}
