//! REST transport for the metadata catalog.

use crate::http::{HttpClient, RateLimitConfig};
use crate::traits::{CatalogTransport, ConnectorConfig, ConnectorResult};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

/// [`CatalogTransport`] backed by the catalog's REST API.
pub struct HttpCatalogTransport {
    client: HttpClient,
}

impl HttpCatalogTransport {
    /// Creates a transport from connector configuration.
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        Self::with_rate_limit(config, None)
    }

    /// Creates a transport that throttles requests to the catalog.
    pub fn with_rate_limit(
        config: ConnectorConfig,
        rate_limit: Option<RateLimitConfig>,
    ) -> ConnectorResult<Self> {
        Ok(Self {
            client: HttpClient::with_rate_limit(config, rate_limit)?,
        })
    }
}

#[async_trait]
impl CatalogTransport for HttpCatalogTransport {
    fn name(&self) -> &str {
        self.client.name()
    }

    #[instrument(skip(self))]
    async fn get_type(&self, type_id: &str) -> ConnectorResult<Value> {
        self.client.get_json_segments(&["types", type_id], &[]).await
    }

    #[instrument(skip(self, properties), fields(requested = properties.map_or(0, |p| p.len())))]
    async fn get_object(
        &self,
        id: &str,
        properties: Option<&[String]>,
    ) -> ConnectorResult<Value> {
        let query = match properties {
            Some(names) => vec![("properties", names.join(","))],
            None => Vec::new(),
        };
        self.client
            .get_json_segments(&["objects", id], &query)
            .await
    }

    #[instrument(skip(self))]
    async fn get_page(
        &self,
        id: &str,
        property: &str,
        begin: u64,
        page_size: u32,
    ) -> ConnectorResult<Value> {
        debug!("Fetching relationship page");
        let query = [
            ("begin", begin.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        self.client
            .get_json_segments(&["objects", id, property], &query)
            .await
    }
}
