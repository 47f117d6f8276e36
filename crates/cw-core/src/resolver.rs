//! Reference to detail resolution.

use crate::cache::{CacheOptions, CacheStats, IdentityCache};
use crate::collection::{CollectionCursor, CollectionOptions, PagedCollection};
use crate::decoder;
use crate::error::{CatalogError, CatalogResult};
use crate::metrics;
use crate::object::{DetailObject, LoadScope};
use crate::reference::Reference;
use crate::registry::{AssetTypeDescriptor, TypeRegistry};
use cw_connectors::{CatalogTransport, ConnectorError};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Resolves references into [`DetailObject`]s.
///
/// Full loads go through the identity cache, so concurrent resolutions of
/// one id share a single fetch. Partial loads always fetch: a partial result
/// must never answer a later full request.
#[derive(Clone)]
pub struct DetailResolver {
    transport: Arc<dyn CatalogTransport>,
    registry: TypeRegistry,
    cache: IdentityCache<Arc<DetailObject>>,
}

impl DetailResolver {
    pub fn new(
        transport: Arc<dyn CatalogTransport>,
        registry: TypeRegistry,
        cache_options: CacheOptions,
    ) -> Self {
        Self {
            transport,
            registry,
            cache: IdentityCache::new(cache_options),
        }
    }

    pub fn transport(&self) -> &Arc<dyn CatalogTransport> {
        &self.transport
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Fully loads the referenced asset.
    #[instrument(skip(self), fields(asset = %reference))]
    pub async fn resolve(&self, reference: &Reference) -> CatalogResult<Arc<DetailObject>> {
        let transport = Arc::clone(&self.transport);
        let registry = self.registry.clone();
        let id = reference.id().to_string();
        let type_id = reference.type_id().to_string();

        self.cache
            .get_or_fetch(reference.id(), move || async move {
                fetch_detail(transport, registry, id, type_id, None).await
            })
            .await
    }

    /// Loads only the named properties plus the type's identifying ones.
    ///
    /// Properties outside that set report `NotLoaded` on the result.
    #[instrument(skip(self, properties), fields(asset = %reference))]
    pub async fn resolve_partial<I, S>(
        &self,
        reference: &Reference,
        properties: I,
    ) -> CatalogResult<Arc<DetailObject>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requested: BTreeSet<String> = properties.into_iter().map(Into::into).collect();
        fetch_detail(
            Arc::clone(&self.transport),
            self.registry.clone(),
            reference.id().to_string(),
            reference.type_id().to_string(),
            Some(requested),
        )
        .await
    }

    /// Full load when `properties` is `None`, partial load otherwise.
    pub async fn resolve_scoped(
        &self,
        reference: &Reference,
        properties: Option<&BTreeSet<String>>,
    ) -> CatalogResult<Arc<DetailObject>> {
        match properties {
            None => self.resolve(reference).await,
            Some(names) => self.resolve_partial(reference, names.iter().cloned()).await,
        }
    }

    /// Fully loads an asset known only by id and type.
    pub async fn resolve_id(&self, id: &str, type_id: &str) -> CatalogResult<Arc<DetailObject>> {
        self.resolve(&Reference::new(id, type_id)).await
    }

    /// Fully loads many assets with at most `concurrency` fetches in flight.
    ///
    /// Results are returned in input order; one failure does not stop the others.
    pub async fn resolve_many(
        &self,
        references: &[Reference],
        concurrency: usize,
    ) -> Vec<CatalogResult<Arc<DetailObject>>> {
        stream::iter(references)
            .map(|reference| self.resolve(reference))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    /// Drops any cached or in-flight full load of `id`.
    pub async fn invalidate(&self, id: &str) -> bool {
        self.cache.invalidate(id).await
    }

    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all().await;
    }

    /// Starts a new pass over a collection.
    pub fn iterate(&self, collection: PagedCollection, options: CollectionOptions) -> CollectionCursor {
        CollectionCursor::new(collection, self.clone(), options)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// What to ask the catalog for, given the descriptor of the type fetched as.
struct FetchPlan {
    scope: LoadScope,
    wire: Option<Vec<String>>,
}

impl FetchPlan {
    fn new(descriptor: &AssetTypeDescriptor, requested: Option<&BTreeSet<String>>) -> Self {
        match requested {
            None if descriptor.is_unknown() => Self {
                scope: LoadScope::Full,
                wire: None,
            },
            None => Self {
                scope: LoadScope::Full,
                wire: Some(descriptor.property_names()),
            },
            Some(names) => {
                let mut names = names.clone();
                names.extend(descriptor.identifying_properties().iter().cloned());
                Self {
                    wire: Some(names.iter().cloned().collect()),
                    scope: LoadScope::Partial(names),
                }
            }
        }
    }

    /// True when a response fetched under this plan holds everything `other` asks for.
    fn covers(&self, other: &FetchPlan) -> bool {
        match (&self.wire, &other.wire) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(sent), Some(needed)) => needed.iter().all(|name| sent.contains(name)),
        }
    }

    /// Scope limited to what was actually sent on the wire.
    fn sent_scope(&self) -> LoadScope {
        match &self.wire {
            None => LoadScope::Full,
            Some(sent) => LoadScope::partial(sent.iter().cloned()),
        }
    }
}

/// Fetches and decodes one asset.
///
/// The request is planned from the reference's type. When the envelope
/// declares another `_type`, the object is decoded with that type's
/// descriptor, refetching once if the first request left out properties the
/// declared type needs.
async fn fetch_detail(
    transport: Arc<dyn CatalogTransport>,
    registry: TypeRegistry,
    id: String,
    type_id: String,
    requested: Option<BTreeSet<String>>,
) -> CatalogResult<Arc<DetailObject>> {
    let mut resolution = registry.resolve(&type_id).await;
    let mut fetched_as = type_id;
    let mut plan = FetchPlan::new(&resolution.descriptor, requested.as_ref());
    let mut refetched = false;

    loop {
        let envelope = fetch_envelope(transport.as_ref(), &id, &plan).await?;
        let declared_type = decoder::envelope_type(&envelope)?.to_string();

        if declared_type == fetched_as {
            let object = decoder::decode_with(
                &envelope,
                resolution.descriptor,
                plan.scope,
                resolution.warning,
            )?;
            return Ok(Arc::new(object));
        }

        let declared = registry.resolve(&declared_type).await;
        let needed = FetchPlan::new(&declared.descriptor, requested.as_ref());
        let covered = plan.covers(&needed);
        if covered || refetched {
            let scope = if covered { needed.scope } else { plan.sent_scope() };
            let object =
                decoder::decode_with(&envelope, declared.descriptor, scope, declared.warning)?;
            return Ok(Arc::new(object));
        }

        debug!(
            id = %id,
            requested_as = %fetched_as,
            declared = %declared_type,
            "Refetching under the declared type"
        );
        refetched = true;
        fetched_as = declared_type;
        resolution = declared;
        plan = needed;
    }
}

async fn fetch_envelope(
    transport: &dyn CatalogTransport,
    id: &str,
    plan: &FetchPlan,
) -> CatalogResult<Value> {
    metrics::record_object_fetch();
    debug!(
        id = %id,
        partial = !plan.scope.is_full(),
        "Fetching object envelope"
    );

    transport
        .get_object(id, plan.wire.as_deref())
        .await
        .map_err(|err| match err {
            ConnectorError::NotFound(_) => CatalogError::NotFound(id.to_string()),
            other => CatalogError::from(other),
        })
}
