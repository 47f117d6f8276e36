//! Configuration loading for the catalog-walker CLI.

use anyhow::{Context, Result};
use cw_connectors::{AuthConfig, ConnectorConfig, RateLimitConfig, SecureString};
use cw_core::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

const REDACTED: &str = "***REDACTED***";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Catalog connection.
    #[serde(default = "default_connector")]
    pub connector: ConnectorConfig,

    /// Traversal tunables.
    #[serde(default)]
    pub client: ClientConfig,

    /// Client-side request throttling.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,

    /// Schema table used to seed the type registry before any request.
    #[serde(default)]
    pub schema_table: Option<String>,
}

fn default_connector() -> ConnectorConfig {
    ConnectorConfig::new("catalog", "http://localhost:9080/api")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connector: default_connector(),
            client: ClientConfig::default(),
            rate_limit: None,
            schema_table: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Creates a copy with credentials redacted.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        let redacted = || SecureString::from(REDACTED);

        match &mut config.connector.auth {
            AuthConfig::None => {}
            AuthConfig::ApiKey { key, .. } => *key = redacted(),
            AuthConfig::BearerToken { token } => *token = redacted(),
            AuthConfig::Basic { password, .. } => *password = redacted(),
        }

        for (name, value) in config.connector.headers.iter_mut() {
            if is_sensitive_header(name) {
                *value = REDACTED.to_string();
            }
        }

        config
    }
}

fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    ["authorization", "cookie", "token", "key", "secret"]
        .iter()
        .any(|needle| name.contains(needle))
}
