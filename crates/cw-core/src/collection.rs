//! Paged relationship collections.
//!
//! A [`PagedCollection`] is a value describing one collection relationship
//! of one asset. Iteration state lives in a [`CollectionCursor`], so any
//! number of independent passes can run over the same collection.
//!
//! Paging uses a zero-based offset and a fixed page size. The total reported
//! by the first page is authoritative for the whole pass: a later page that
//! disagrees, or an empty page before the total is reached, means the
//! collection changed underneath the cursor and the pass halts with
//! [`CatalogError::PaginationInconsistency`].

use crate::error::{CatalogError, CatalogResult, Warning};
use crate::metrics;
use crate::object::DetailObject;
use crate::reference::Reference;
use crate::resolver::DetailResolver;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of members requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Maximum page size the catalog accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// One page of a collection as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<Value>,
    /// Total members reported for the collection, if the page carried one.
    pub num_total: Option<u64>,
    /// Offset of the first item.
    pub begin: u64,
    /// Link to the next page, if the catalog supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PagingBlock {
    #[serde(rename = "numTotal", default)]
    num_total: Option<u64>,
    #[serde(default)]
    begin: Option<u64>,
    #[serde(default)]
    next: Option<String>,
}

impl Page {
    /// Parses a page document (`{"items": [...], "paging": {...}}`) or a bare
    /// array of stubs.
    ///
    /// A list without a paging block is complete: its total is its length.
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Self::complete(items.clone())),
            Value::Object(fields) => {
                let items = fields.get("items")?.as_array()?.clone();
                let Some(paging) = fields.get("paging").filter(|p| !p.is_null()) else {
                    return Some(Self::complete(items));
                };
                let paging: PagingBlock = serde_json::from_value(paging.clone()).ok()?;
                Some(Self {
                    items,
                    num_total: paging.num_total,
                    begin: paging.begin.unwrap_or(0),
                    next: paging.next,
                })
            }
            _ => None,
        }
    }

    fn complete(items: Vec<Value>) -> Self {
        Self {
            num_total: Some(items.len() as u64),
            items,
            begin: 0,
            next: None,
        }
    }
}

/// A collection relationship of one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedCollection {
    owner: Reference,
    property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline: Option<Page>,
}

impl PagedCollection {
    /// A collection with no inline data; every page is fetched.
    pub fn new(owner: Reference, property: impl Into<String>, target_type: Option<String>) -> Self {
        Self {
            owner,
            property: property.into(),
            target_type,
            inline: None,
        }
    }

    /// A collection seeded with the first page its owner's envelope carried.
    pub fn from_inline(
        owner: Reference,
        property: impl Into<String>,
        target_type: Option<String>,
        page: Page,
    ) -> Self {
        Self {
            inline: Some(page),
            ..Self::new(owner, property, target_type)
        }
    }

    pub fn owner(&self) -> &Reference {
        &self.owner
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// Declared member type, if the schema names one.
    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }

    pub fn inline_page(&self) -> Option<&Page> {
        self.inline.as_ref()
    }

    /// Member count reported by the inline page, if there was one.
    pub fn total(&self) -> Option<u64> {
        self.inline.as_ref().and_then(|page| page.num_total)
    }

    /// `owner_id.property`, used in errors and warnings.
    pub fn label(&self) -> String {
        format!("{}.{}", self.owner.id(), self.property)
    }
}

/// How a cursor pages and what it yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOptions {
    /// Members requested per page, within `1..=MAX_PAGE_SIZE`.
    pub page_size: u32,
    /// Resolve each member to a [`DetailObject`] instead of yielding references.
    #[serde(default)]
    pub eager: bool,
    /// Properties to load when resolving eagerly; `None` means a full load.
    #[serde(default)]
    pub eager_properties: Option<BTreeSet<String>>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            eager: false,
            eager_properties: None,
        }
    }
}

impl CollectionOptions {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// Resolves members eagerly, loading only the named properties.
    pub fn eager_with<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.eager = true;
        self.eager_properties = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// A member produced by a cursor.
#[derive(Debug, Clone)]
pub enum CollectionItem {
    Reference(Reference),
    Detail(Arc<DetailObject>),
}

impl CollectionItem {
    pub fn reference(&self) -> &Reference {
        match self {
            CollectionItem::Reference(reference) => reference,
            CollectionItem::Detail(object) => object.reference(),
        }
    }

    pub fn id(&self) -> &str {
        self.reference().id()
    }

    pub fn into_detail(self) -> Option<Arc<DetailObject>> {
        match self {
            CollectionItem::Detail(object) => Some(object),
            CollectionItem::Reference(_) => None,
        }
    }
}

/// One forward-only pass over a [`PagedCollection`].
///
/// Pages are fetched strictly in offset order, one at a time, only when the
/// buffered members run out. Ids already produced in this pass are dropped
/// with a [`Warning::DuplicateInCollection`].
pub struct CollectionCursor {
    collection: PagedCollection,
    resolver: DetailResolver,
    options: CollectionOptions,
    buffer: VecDeque<Reference>,
    seen: HashSet<String>,
    warnings: Vec<Warning>,
    offset: u64,
    total: Option<u64>,
    advisory_total: Option<u64>,
    started: bool,
    exhausted: bool,
    halted: bool,
}

impl CollectionCursor {
    pub(crate) fn new(
        collection: PagedCollection,
        resolver: DetailResolver,
        options: CollectionOptions,
    ) -> Self {
        Self {
            collection,
            resolver,
            options,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            warnings: Vec::new(),
            offset: 0,
            total: None,
            advisory_total: None,
            started: false,
            exhausted: false,
            halted: false,
        }
    }

    /// Produces the next member, or `None` once the pass is finished.
    ///
    /// A transport error leaves the cursor where it was, so calling `next`
    /// again retries the same page. A pagination inconsistency halts the
    /// cursor for good.
    pub async fn next(&mut self) -> CatalogResult<Option<CollectionItem>> {
        loop {
            if let Some(reference) = self.buffer.pop_front() {
                return self.produce(reference).await.map(Some);
            }
            if self.halted || self.exhausted {
                return Ok(None);
            }
            self.fill_buffer().await?;
        }
    }

    /// Drains the cursor.
    pub async fn collect_all(&mut self) -> CatalogResult<Vec<CollectionItem>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Member count fixed by the first page, once it has been seen.
    ///
    /// `None` when the first page carried no total. Totals reported by later
    /// pages are then only used to end the pass early and never halt it.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Warnings recorded so far in this pass.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Offset of the next page to fetch.
    pub fn position(&self) -> u64 {
        self.offset
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn collection(&self) -> &PagedCollection {
        &self.collection
    }

    async fn produce(&mut self, reference: Reference) -> CatalogResult<CollectionItem> {
        if !self.options.eager {
            return Ok(CollectionItem::Reference(reference));
        }

        let resolved = self
            .resolver
            .resolve_scoped(&reference, self.options.eager_properties.as_ref())
            .await;
        match resolved {
            Ok(object) => Ok(CollectionItem::Detail(object)),
            Err(err) => {
                // Keep the member so a retry picks it up again.
                self.buffer.push_front(reference);
                Err(err)
            }
        }
    }

    async fn fill_buffer(&mut self) -> CatalogResult<()> {
        let (page, inline) = self.next_page().await?;
        let first = !self.started;
        self.started = true;

        if let Some(page_total) = page.num_total {
            match self.total {
                _ if first => self.total = Some(page_total),
                Some(total) if total != page_total => {
                    return Err(self.halt(format!(
                        "total changed from {} to {}",
                        total, page_total
                    )));
                }
                Some(_) => {}
                None => self.advisory_total = Some(page_total),
            }
        }

        if page.items.is_empty() {
            match self.total {
                Some(total) if self.offset < total => {
                    return Err(self.halt(format!(
                        "empty page before reaching total of {}",
                        total
                    )));
                }
                _ => {
                    self.exhausted = true;
                    return Ok(());
                }
            }
        }

        let received = page.items.len() as u64;
        let remaining = self
            .total
            .map(|total| total.saturating_sub(self.offset))
            .unwrap_or(received);

        for (index, item) in page.items.iter().take(remaining as usize).enumerate() {
            let position = self.offset + index as u64;
            self.accept(item, position);
        }

        self.offset += received;
        self.exhausted = match (self.total, self.advisory_total) {
            (Some(total), _) => self.offset >= total,
            (None, Some(hint)) if self.offset >= hint => true,
            // The server sized an inline page, so only a fetched page can come up short.
            _ => {
                !inline
                    && page.next.is_none()
                    && received < u64::from(self.options.effective_page_size())
            }
        };
        Ok(())
    }

    /// Returns the next page and whether it came inline with the owner.
    async fn next_page(&mut self) -> CatalogResult<(Page, bool)> {
        if !self.started {
            if let Some(inline) = self.collection.inline_page().filter(|p| p.begin == 0) {
                debug!(collection = %self.collection.label(), "Using inline first page");
                return Ok((inline.clone(), true));
            }
        }

        let page_size = self.options.effective_page_size();
        debug!(
            collection = %self.collection.label(),
            offset = self.offset,
            page_size,
            "Fetching collection page"
        );
        metrics::record_page_fetch();

        let document = self
            .resolver
            .transport()
            .get_page(
                self.collection.owner().id(),
                self.collection.property(),
                self.offset,
                page_size,
            )
            .await?;

        let page = Page::parse(&document).ok_or_else(|| {
            CatalogError::MalformedEnvelope(format!(
                "page of {} at offset {} has no item list",
                self.collection.label(),
                self.offset
            ))
        })?;
        Ok((page, false))
    }

    fn accept(&mut self, item: &Value, position: u64) {
        let Some(reference) = Reference::from_stub(item) else {
            self.record(Warning::UnexpectedShape {
                property: self.collection.label(),
                expected: "reference stub".to_string(),
            });
            return;
        };

        if self.seen.insert(reference.id().to_string()) {
            self.buffer.push_back(reference);
        } else {
            self.record(Warning::DuplicateInCollection {
                collection: self.collection.label(),
                id: reference.id().to_string(),
                offset: position,
            });
        }
    }

    fn record(&mut self, warning: Warning) {
        warn!(warning = %warning, "Collection anomaly");
        metrics::record_warning();
        self.warnings.push(warning);
    }

    fn halt(&mut self, detail: String) -> CatalogError {
        self.halted = true;
        self.buffer.clear();
        warn!(collection = %self.collection.label(), offset = self.offset, %detail, "Halting collection pass");
        CatalogError::PaginationInconsistency {
            collection: self.collection.label(),
            offset: self.offset,
            detail,
        }
    }
}
