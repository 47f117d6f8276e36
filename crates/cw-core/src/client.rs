//! High-level catalog client.

use crate::cache::CacheStats;
use crate::collection::{CollectionCursor, CollectionOptions, PagedCollection};
use crate::config::ClientConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::object::{DetailObject, PropertyLookup, PropertyValue};
use crate::reference::Reference;
use crate::registry::{PropertyKind, TypeRegistry, TypeResolution};
use crate::resolver::DetailResolver;
use cw_connectors::CatalogTransport;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Entry point for traversing a catalog.
///
/// Cheap to clone; clones share the type registry and identity cache.
#[derive(Clone)]
pub struct CatalogClient {
    config: ClientConfig,
    registry: TypeRegistry,
    resolver: DetailResolver,
}

/// Builder for [`CatalogClient`].
pub struct CatalogClientBuilder {
    transport: Arc<dyn CatalogTransport>,
    config: ClientConfig,
}

impl CatalogClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn eager_relationships(mut self, eager: bool) -> Self {
        self.config.eager_relationships = eager;
        self
    }

    pub fn build(self) -> CatalogClient {
        info!(
            transport = self.transport.name(),
            page_size = self.config.page_size,
            cache_capacity = self.config.cache_capacity,
            "Creating catalog client"
        );
        let registry = TypeRegistry::new(Arc::clone(&self.transport));
        let resolver = DetailResolver::new(
            self.transport,
            registry.clone(),
            self.config.cache_options(),
        );
        CatalogClient {
            config: self.config,
            registry,
            resolver,
        }
    }
}

impl CatalogClient {
    pub fn builder(transport: Arc<dyn CatalogTransport>) -> CatalogClientBuilder {
        CatalogClientBuilder {
            transport,
            config: ClientConfig::default(),
        }
    }

    /// A client with default configuration.
    pub fn new(transport: Arc<dyn CatalogTransport>) -> Self {
        Self::builder(transport).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &DetailResolver {
        &self.resolver
    }

    /// Resolves a type, falling back to the unknown descriptor on failure.
    pub async fn type_descriptor(&self, type_id: &str) -> TypeResolution {
        self.registry.resolve(type_id).await
    }

    /// Seeds the registry from a schema table. Returns the number of types seeded.
    pub async fn seed_types(&self, table: &Value) -> CatalogResult<usize> {
        self.registry.seed_from_json(table).await
    }

    pub async fn resolve(&self, reference: &Reference) -> CatalogResult<Arc<DetailObject>> {
        self.resolver.resolve(reference).await
    }

    pub async fn resolve_partial<I, S>(
        &self,
        reference: &Reference,
        properties: I,
    ) -> CatalogResult<Arc<DetailObject>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver.resolve_partial(reference, properties).await
    }

    pub async fn resolve_id(&self, id: &str, type_id: &str) -> CatalogResult<Arc<DetailObject>> {
        self.resolver.resolve_id(id, type_id).await
    }

    /// Fully loads many assets, bounded by `max_concurrent_fetches`.
    pub async fn resolve_many(
        &self,
        references: &[Reference],
    ) -> Vec<CatalogResult<Arc<DetailObject>>> {
        self.resolver
            .resolve_many(references, self.config.max_concurrent_fetches)
            .await
    }

    /// Returns the collection relationship `name` of `object`.
    ///
    /// A collection the envelope did not carry inline is still returned when
    /// the type declares it; every page is then fetched on iteration.
    pub fn relationship(&self, object: &DetailObject, name: &str) -> CatalogResult<PagedCollection> {
        let unknown = || CatalogError::UnknownRelationship {
            type_id: object.type_id().to_string(),
            property: name.to_string(),
        };

        match object.property(name) {
            PropertyLookup::Present(PropertyValue::Collection(collection)) => Ok(collection.clone()),
            PropertyLookup::Present(_) => Err(unknown()),
            PropertyLookup::NotLoaded => Err(CatalogError::NotLoaded {
                id: object.id().to_string(),
                property: name.to_string(),
            }),
            PropertyLookup::Absent | PropertyLookup::NotModeled(_) => {
                match object.descriptor().kind_of(name) {
                    Some(PropertyKind::CollectionRelationship(target)) => Ok(PagedCollection::new(
                        object.reference().clone(),
                        name,
                        target.map(str::to_string),
                    )),
                    _ => Err(unknown()),
                }
            }
        }
    }

    /// Resolves the single relationship `name` of `object`, if set.
    pub async fn follow(
        &self,
        object: &DetailObject,
        name: &str,
    ) -> CatalogResult<Option<Arc<DetailObject>>> {
        match object.reference_property(name)? {
            Some(reference) => self.resolve(reference).await.map(Some),
            None if object.descriptor().declares(name) => Ok(None),
            None => Err(CatalogError::UnknownRelationship {
                type_id: object.type_id().to_string(),
                property: name.to_string(),
            }),
        }
    }

    /// Starts a pass over a collection with the configured defaults.
    pub fn iterate(&self, collection: PagedCollection) -> CollectionCursor {
        self.iterate_with(collection, self.config.collection_options())
    }

    pub fn iterate_with(
        &self,
        collection: PagedCollection,
        options: CollectionOptions,
    ) -> CollectionCursor {
        self.resolver.iterate(collection, options)
    }

    /// Starts a pass over the collection relationship `name` of `object`.
    pub fn walk(&self, object: &DetailObject, name: &str) -> CatalogResult<CollectionCursor> {
        Ok(self.iterate(self.relationship(object, name)?))
    }

    pub async fn invalidate(&self, id: &str) -> bool {
        self.resolver.invalidate(id).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache_stats()
    }
}
