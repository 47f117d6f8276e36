//! Metric descriptions for catalog traversal.
//!
//! `cw-core` records counters through the `metrics` facade. Installing an
//! exporter is up to the application; this module describes the metrics so
//! any exporter can label them.

use cw_core::metrics::{
    CACHE_HITS, CACHE_MISSES, DECODE_WARNINGS, OBJECT_FETCHES, PAGES_FETCHED, TYPE_FETCHES,
};
use cw_core::CacheStats;
use metrics::{describe_counter, describe_gauge, gauge};

/// Resolved objects currently held by the identity cache.
pub const CACHE_SIZE: &str = "catalog_cache_size";
/// Fraction of lookups answered without a new fetch.
pub const CACHE_HIT_RATE: &str = "catalog_cache_hit_rate";

/// Registers descriptions for every catalog metric.
pub fn describe_catalog_metrics() {
    describe_counter!(CACHE_HITS, "Lookups served from the cache or an in-flight fetch");
    describe_counter!(CACHE_MISSES, "Lookups that started a new fetch");
    describe_counter!(OBJECT_FETCHES, "Object envelopes fetched from the catalog");
    describe_counter!(PAGES_FETCHED, "Relationship pages fetched from the catalog");
    describe_counter!(TYPE_FETCHES, "Type schemas fetched from the catalog");
    describe_counter!(
        DECODE_WARNINGS,
        "Non-fatal anomalies raised while decoding or paging"
    );

    describe_gauge!(CACHE_SIZE, "Resolved objects held by the identity cache");
    describe_gauge!(CACHE_HIT_RATE, "Fraction of lookups that did not fetch");
}

/// Publishes a cache statistics snapshot as gauges.
pub fn record_cache_stats(stats: &CacheStats) {
    gauge!(CACHE_SIZE).set(stats.size as f64);
    gauge!(CACHE_HIT_RATE).set(stats.hit_rate());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_without_recorder() {
        // No recorder installed: describing and recording are no-ops.
        describe_catalog_metrics();
        record_cache_stats(&CacheStats {
            hits: 3,
            misses: 1,
            joined: 0,
            size: 1,
        });
    }

    #[test]
    fn test_metric_names_are_distinct() {
        let mut names = vec![
            CACHE_HITS,
            CACHE_MISSES,
            OBJECT_FETCHES,
            PAGES_FETCHED,
            TYPE_FETCHES,
            DECODE_WARNINGS,
            CACHE_SIZE,
            CACHE_HIT_RATE,
        ];
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
        assert!(names.iter().all(|name| name.starts_with("catalog_")));
    }
}
