//! Transport trait definitions for the metadata catalog.
//!
//! The runtime in `cw-core` never talks HTTP directly. It goes through
//! [`CatalogTransport`], which exposes the three read endpoints the catalog
//! offers: type schemas, object envelopes, and relationship pages.

use crate::secure_string::SecureString;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while talking to the catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for transport operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Configuration for a catalog connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connection name, used in logs.
    pub name: String,
    /// Base URL of the catalog REST API (e.g. `https://catalog.example.com/api/v1`).
    pub base_url: String,
    /// Authentication injected on every request.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum retries for retryable failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Whether to verify TLS certificates.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_verify_tls() -> bool {
    true
}

impl ConnectorConfig {
    /// Creates a configuration with default timeouts and no authentication.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            auth: AuthConfig::None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            verify_tls: default_verify_tls(),
            headers: HashMap::new(),
        }
    }
}

/// Authentication configuration.
///
/// Session negotiation is the catalog's business; the client only attaches
/// whatever credential it was given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    #[default]
    None,
    /// API key sent in a custom header.
    ApiKey {
        key: SecureString,
        header_name: String,
    },
    /// Bearer token authentication.
    BearerToken { token: SecureString },
    /// Basic authentication.
    Basic {
        username: String,
        password: SecureString,
    },
}

/// Read access to a metadata catalog.
///
/// Every method returns the raw JSON document the catalog produced. Decoding
/// into typed shapes happens above this seam.
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    /// Returns the transport name.
    fn name(&self) -> &str;

    /// Fetches the schema document of an asset type (`GET /types/{type_id}`).
    async fn get_type(&self, type_id: &str) -> ConnectorResult<Value>;

    /// Fetches an object envelope (`GET /objects/{id}?properties=...`).
    ///
    /// `None` lets the catalog choose which properties to return.
    async fn get_object(&self, id: &str, properties: Option<&[String]>)
        -> ConnectorResult<Value>;

    /// Fetches one page of a relationship collection
    /// (`GET /objects/{id}/{property}?begin=N&pageSize=M`).
    async fn get_page(
        &self,
        id: &str,
        property: &str,
        begin: u64,
        page_size: u32,
    ) -> ConnectorResult<Value>;
}
