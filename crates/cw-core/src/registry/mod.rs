//! Type registry.
//!
//! Maps a type identifier to its [`AssetTypeDescriptor`]. Descriptors are
//! either seeded from a generated schema table or fetched lazily from the
//! catalog the first time an envelope of that type is decoded. Concurrent
//! first resolutions of one type share a single schema fetch.

mod descriptor;

pub use descriptor::{
    AssetTypeDescriptor, AssetTypeDescriptorBuilder, PropertyKind, ScalarKind, ScalarProperty,
};

use crate::cache::IdentityCache;
use crate::error::{CatalogError, CatalogResult, Warning};
use crate::metrics;
use cw_connectors::CatalogTransport;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of resolving a type: always a usable descriptor, plus a warning
/// when it had to fall back to the unknown descriptor.
#[derive(Debug, Clone)]
pub struct TypeResolution {
    pub descriptor: Arc<AssetTypeDescriptor>,
    pub warning: Option<Warning>,
}

impl TypeResolution {
    pub fn is_unknown(&self) -> bool {
        self.descriptor.is_unknown()
    }
}

/// Thread-safe registry of asset type descriptors.
#[derive(Clone)]
pub struct TypeRegistry {
    transport: Arc<dyn CatalogTransport>,
    descriptors: IdentityCache<Arc<AssetTypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new(transport: Arc<dyn CatalogTransport>) -> Self {
        Self {
            transport,
            descriptors: IdentityCache::unbounded(),
        }
    }

    /// Returns the descriptor for `type_id`, fetching its schema if needed.
    ///
    /// Never fails: an unreachable or unparseable schema yields the unknown
    /// descriptor and an [`Warning::UnknownType`]. Failures are not
    /// remembered, so a later call tries again.
    #[instrument(skip(self))]
    pub async fn resolve(&self, type_id: &str) -> TypeResolution {
        let transport = Arc::clone(&self.transport);
        let key = type_id.to_string();

        let outcome = self
            .descriptors
            .get_or_fetch(type_id, move || fetch_descriptor(transport, key))
            .await;

        match outcome {
            Ok(descriptor) => TypeResolution {
                descriptor,
                warning: None,
            },
            Err(err) => {
                warn!(type_id, error = %err, "Falling back to opaque decoding for unresolved type");
                metrics::record_warning();
                TypeResolution {
                    descriptor: Arc::new(AssetTypeDescriptor::unknown(type_id)),
                    warning: Some(Warning::UnknownType {
                        type_id: type_id.to_string(),
                        reason: err.to_string(),
                    }),
                }
            }
        }
    }

    /// Registers a descriptor under `type_id`, replacing any earlier one.
    pub async fn seed(&self, type_id: &str, descriptor: AssetTypeDescriptor) {
        debug!(type_id, "Seeding type descriptor");
        self.descriptors.insert(type_id, Arc::new(descriptor)).await;
    }

    /// Seeds every type in a schema table: a JSON array of type schema
    /// documents, or a single document. Returns the number of types seeded.
    pub async fn seed_from_json(&self, table: &Value) -> CatalogResult<usize> {
        let documents = match table {
            Value::Array(documents) => documents.iter().collect::<Vec<_>>(),
            document @ Value::Object(_) => vec![document],
            _ => {
                return Err(CatalogError::MalformedEnvelope(
                    "schema table must be an array of type documents".to_string(),
                ))
            }
        };

        let descriptors = documents
            .into_iter()
            .map(AssetTypeDescriptor::from_schema)
            .collect::<CatalogResult<Vec<_>>>()?;

        let count = descriptors.len();
        for descriptor in descriptors {
            let type_id = descriptor.type_id().to_string();
            self.seed(&type_id, descriptor).await;
        }
        info!(count, "Seeded type registry from schema table");
        Ok(count)
    }

    /// Returns a descriptor only if it is already registered.
    pub async fn descriptor(&self, type_id: &str) -> Option<Arc<AssetTypeDescriptor>> {
        self.descriptors.get(type_id).await
    }

    /// Drops a registered descriptor so the next resolution refetches it.
    pub async fn forget(&self, type_id: &str) -> bool {
        self.descriptors.invalidate(type_id).await
    }

    /// Registered type ids, sorted.
    pub fn known_types(&self) -> Vec<String> {
        let mut ids = self.descriptors.resolved_ids();
        ids.sort();
        ids
    }
}

async fn fetch_descriptor(
    transport: Arc<dyn CatalogTransport>,
    type_id: String,
) -> CatalogResult<Arc<AssetTypeDescriptor>> {
    metrics::record_type_fetch();
    debug!(type_id = %type_id, transport = transport.name(), "Fetching type schema");

    let schema = transport.get_type(&type_id).await?;
    let descriptor = AssetTypeDescriptor::from_schema(&schema)?;
    Ok(Arc::new(descriptor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_connectors::testing::{collection_relationship, scalar_property, type_schema};
    use cw_connectors::{ConnectorError, MockCatalogTransport};
    use serde_json::json;
    use std::time::Duration;

    fn table_transport() -> MockCatalogTransport {
        MockCatalogTransport::new("mock").with_type(type_schema(
            "table",
            "Database Table",
            vec![
                scalar_property("name", "string"),
                collection_relationship("columns", "column"),
            ],
        ))
    }

    #[tokio::test]
    async fn test_resolve_fetches_once() {
        let transport = Arc::new(table_transport());
        let registry = TypeRegistry::new(transport.clone());

        let first = registry.resolve("table").await;
        let second = registry.resolve("table").await;

        assert!(first.warning.is_none());
        assert_eq!(first.descriptor.display_name(), "Database Table");
        assert!(Arc::ptr_eq(&first.descriptor, &second.descriptor));
        assert_eq!(transport.type_fetch_count(), 1);
        assert_eq!(registry.known_types(), vec!["table".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_resolution_shares_fetch() {
        let transport = Arc::new(table_transport().with_latency(Duration::from_millis(20)));
        let registry = TypeRegistry::new(transport.clone());

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.resolve("table").await })
            })
            .collect();
        for handle in handles {
            assert!(!handle.await.unwrap().is_unknown());
        }

        assert_eq!(transport.type_fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_type_degrades_with_warning() {
        let transport = Arc::new(table_transport());
        transport
            .fail_type("table", ConnectorError::Timeout("schema".to_string()))
            .await;
        let registry = TypeRegistry::new(transport.clone());

        let resolution = registry.resolve("table").await;
        assert!(resolution.is_unknown());
        assert!(matches!(
            resolution.warning,
            Some(Warning::UnknownType { ref type_id, .. }) if type_id == "table"
        ));

        // Not remembered: the next call asks again.
        registry.resolve("table").await;
        assert_eq!(transport.type_fetch_count(), 2);
        assert!(registry.descriptor("table").await.is_none());
    }

    #[tokio::test]
    async fn test_seed_replaces_wholesale() {
        let transport = Arc::new(table_transport());
        let registry = TypeRegistry::new(transport.clone());
        registry.resolve("table").await;

        let replacement = AssetTypeDescriptor::builder("table", "Table v2")
            .scalar("name", ScalarKind::String)
            .build();
        registry.seed("table", replacement).await;

        let resolution = registry.resolve("table").await;
        assert_eq!(resolution.descriptor.display_name(), "Table v2");
        assert!(!resolution.descriptor.declares("columns"));
        assert_eq!(transport.type_fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_seed_from_json_avoids_network() {
        let transport = Arc::new(MockCatalogTransport::new("mock"));
        let registry = TypeRegistry::new(transport.clone());

        let count = registry
            .seed_from_json(&json!([
                type_schema("table", "Table", vec![scalar_property("name", "string")]),
                type_schema("column", "Column", vec![scalar_property("name", "string")]),
            ]))
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(registry.known_types(), vec!["column", "table"]);
        assert!(!registry.resolve("column").await.is_unknown());
        assert_eq!(transport.type_fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_seed_from_json_rejects_scalars() {
        let registry = TypeRegistry::new(Arc::new(MockCatalogTransport::new("mock")));
        assert!(registry.seed_from_json(&json!("table")).await.is_err());
    }
}
