//! Metric names and recording helpers.
//!
//! Counters are emitted through the `metrics` facade; installing a recorder
//! (or not) is up to the embedding application.

/// Lookups served without starting a fetch.
pub const CACHE_HITS: &str = "catalog_cache_hits";
/// Lookups that started a fetch.
pub const CACHE_MISSES: &str = "catalog_cache_misses";
/// Object envelopes fetched from the catalog.
pub const OBJECT_FETCHES: &str = "catalog_object_fetches";
/// Relationship pages fetched from the catalog.
pub const PAGES_FETCHED: &str = "catalog_pages_fetched";
/// Type schemas fetched from the catalog.
pub const TYPE_FETCHES: &str = "catalog_type_fetches";
/// Warnings raised while decoding or paging.
pub const DECODE_WARNINGS: &str = "catalog_decode_warnings";

pub(crate) fn record_cache_hit() {
    ::metrics::counter!(CACHE_HITS).increment(1);
}

pub(crate) fn record_cache_miss() {
    ::metrics::counter!(CACHE_MISSES).increment(1);
}

pub(crate) fn record_object_fetch() {
    ::metrics::counter!(OBJECT_FETCHES).increment(1);
}

pub(crate) fn record_page_fetch() {
    ::metrics::counter!(PAGES_FETCHED).increment(1);
}

pub(crate) fn record_type_fetch() {
    ::metrics::counter!(TYPE_FETCHES).increment(1);
}

pub(crate) fn record_warning() {
    ::metrics::counter!(DECODE_WARNINGS).increment(1);
}
