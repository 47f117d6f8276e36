//! # cw-observability
//!
//! Logging initialisation and metric descriptions for catalog-walker.
//!
//! The runtime crates only emit `tracing` events and `metrics` counters;
//! this crate wires them to a subscriber and documents what each metric
//! means.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::{describe_catalog_metrics, record_cache_stats};
