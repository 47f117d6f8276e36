//! Client runtime configuration.

use crate::cache::CacheOptions;
use crate::collection::{CollectionOptions, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a [`CatalogClient`](crate::CatalogClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Members requested per collection page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Resolve collection members to detail objects by default.
    #[serde(default)]
    pub eager_relationships: bool,

    /// Maximum resolved objects kept in the identity cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Lifetime of a cached object in seconds; unset keeps it until evicted.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Maximum concurrent fetches for bulk resolution.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_max_concurrent_fetches() -> usize {
    8
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            eager_relationships: false,
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: None,
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl ClientConfig {
    /// Default options for new collection cursors.
    pub fn collection_options(&self) -> CollectionOptions {
        CollectionOptions {
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
            eager: self.eager_relationships,
            eager_properties: None,
        }
    }

    pub fn cache_options(&self) -> CacheOptions {
        let options = CacheOptions::bounded(self.cache_capacity);
        match self.cache_ttl_secs {
            Some(secs) => options.with_ttl(Duration::from_secs(secs)),
            None => options,
        }
    }
}
