//! Cache configuration and statistics.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sizing for the resolved-entry store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Maximum resolved entries kept; `None` never evicts.
    pub max_capacity: Option<u64>,
    /// Time-to-live of a resolved entry; `None` keeps it until evicted or invalidated.
    pub time_to_live: Option<Duration>,
}

impl CacheOptions {
    /// Options for a store that never evicts.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(max_capacity: u64) -> Self {
        Self {
            max_capacity: Some(max_capacity),
            time_to_live: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }
}

/// Counters describing how the cache has been used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from a resolved entry.
    pub hits: u64,
    /// Lookups that started a new fetch.
    pub misses: u64,
    /// Lookups that waited on a fetch another caller started.
    pub joined: u64,
    /// Resolved entries currently held (approximate).
    pub size: u64,
}

impl CacheStats {
    /// Fraction of lookups that did not start a fetch.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.joined;
        if total == 0 {
            return 0.0;
        }
        (self.hits + self.joined) as f64 / total as f64
    }
}
