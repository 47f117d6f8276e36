//! # cw-connectors
//!
//! Transport connectors for the metadata catalog.
//!
//! This crate defines the [`CatalogTransport`] seam the runtime in `cw-core`
//! reads through, a REST implementation with retry and rate limiting, and an
//! in-memory mock catalog for tests.

pub mod catalog;
pub mod http;
pub mod mock;
pub mod secure_string;
pub mod testing;
pub mod traits;

pub use catalog::HttpCatalogTransport;
pub use http::{HttpClient, RateLimitConfig};
pub use mock::{MockCatalogTransport, PageRequest};
pub use secure_string::SecureString;
pub use traits::{AuthConfig, CatalogTransport, ConnectorConfig, ConnectorError, ConnectorResult};
