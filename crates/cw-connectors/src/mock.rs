//! In-memory catalog transport for testing.
//!
//! Serves a fixture catalog built from JSON documents and counts every call,
//! so tests can assert exactly how many round trips a traversal caused.

use crate::traits::{CatalogTransport, ConnectorError, ConnectorResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

type CollectionKey = (String, String);

/// A pending replacement of a collection's members, applied after a number
/// of page fetches. Simulates concurrent writes on the catalog side.
struct ScheduledChange {
    after_pages: u64,
    items: Vec<Value>,
}

/// A record of one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub id: String,
    pub property: String,
    pub begin: u64,
    pub page_size: u32,
}

/// Mock catalog transport for testing.
pub struct MockCatalogTransport {
    name: String,
    types: RwLock<HashMap<String, Value>>,
    objects: RwLock<HashMap<String, Value>>,
    collections: RwLock<HashMap<CollectionKey, Vec<Value>>>,
    scheduled: RwLock<HashMap<CollectionKey, ScheduledChange>>,
    failing_types: RwLock<HashMap<String, ConnectorError>>,
    latency: Option<Duration>,
    fail_next_objects: AtomicU32,
    type_fetches: AtomicU64,
    object_fetches: RwLock<HashMap<String, u64>>,
    page_requests: RwLock<Vec<PageRequest>>,
    total_object_fetches: AtomicU64,
}

impl MockCatalogTransport {
    /// Creates an empty mock catalog.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            types: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            collections: RwLock::new(HashMap::new()),
            scheduled: RwLock::new(HashMap::new()),
            failing_types: RwLock::new(HashMap::new()),
            latency: None,
            fail_next_objects: AtomicU32::new(0),
            type_fetches: AtomicU64::new(0),
            object_fetches: RwLock::new(HashMap::new()),
            page_requests: RwLock::new(Vec::new()),
            total_object_fetches: AtomicU64::new(0),
        }
    }

    /// Adds a type schema document, keyed by its `_id`.
    pub fn with_type(mut self, schema: Value) -> Self {
        if let Some(id) = schema.get("_id").and_then(Value::as_str) {
            self.types.get_mut().insert(id.to_string(), schema);
        }
        self
    }

    /// Adds an object envelope, keyed by its `_id`.
    pub fn with_object(mut self, envelope: Value) -> Self {
        if let Some(id) = envelope.get("_id").and_then(Value::as_str) {
            self.objects.get_mut().insert(id.to_string(), envelope);
        }
        self
    }

    /// Sets the members of a relationship collection.
    pub fn with_collection(mut self, id: &str, property: &str, items: Vec<Value>) -> Self {
        self.collections
            .get_mut()
            .insert((id.to_string(), property.to_string()), items);
        self
    }

    /// Delays every response, widening the window for concurrent callers.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every schema fetch for `type_id` fail with `error`.
    pub async fn fail_type(&self, type_id: &str, error: ConnectorError) {
        self.failing_types
            .write()
            .await
            .insert(type_id.to_string(), error);
    }

    /// Makes the next `count` object fetches fail with a connection error.
    pub fn fail_next_object_fetches(&self, count: u32) {
        self.fail_next_objects.store(count, Ordering::SeqCst);
    }

    /// Replaces an object envelope.
    pub async fn insert_object(&self, envelope: Value) {
        if let Some(id) = envelope.get("_id").and_then(Value::as_str) {
            self.objects.write().await.insert(id.to_string(), envelope);
        }
    }

    /// Replaces a collection's members once `after_pages` pages of it have been served.
    pub async fn schedule_collection_change(
        &self,
        id: &str,
        property: &str,
        after_pages: u64,
        items: Vec<Value>,
    ) {
        self.scheduled.write().await.insert(
            (id.to_string(), property.to_string()),
            ScheduledChange { after_pages, items },
        );
    }

    /// Number of schema fetches served or refused.
    pub fn type_fetch_count(&self) -> u64 {
        self.type_fetches.load(Ordering::SeqCst)
    }

    /// Number of object fetches for `id`.
    pub async fn object_fetch_count(&self, id: &str) -> u64 {
        self.object_fetches
            .read()
            .await
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of object fetches across all ids.
    pub fn total_object_fetch_count(&self) -> u64 {
        self.total_object_fetches.load(Ordering::SeqCst)
    }

    /// All page requests served so far, in arrival order.
    pub async fn page_requests(&self) -> Vec<PageRequest> {
        self.page_requests.read().await.clone()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn apply_scheduled_change(&self, key: &CollectionKey, served_pages: u64) {
        let mut scheduled = self.scheduled.write().await;
        let due = scheduled
            .get(key)
            .map(|change| served_pages >= change.after_pages)
            .unwrap_or(false);
        if due {
            if let Some(change) = scheduled.remove(key) {
                self.collections
                    .write()
                    .await
                    .insert(key.clone(), change.items);
            }
        }
    }
}

#[async_trait]
impl CatalogTransport for MockCatalogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_type(&self, type_id: &str) -> ConnectorResult<Value> {
        self.type_fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(error) = self.failing_types.read().await.get(type_id) {
            return Err(error.clone());
        }

        self.types
            .read()
            .await
            .get(type_id)
            .cloned()
            .ok_or_else(|| ConnectorError::NotFound(format!("types/{}", type_id)))
    }

    async fn get_object(
        &self,
        id: &str,
        properties: Option<&[String]>,
    ) -> ConnectorResult<Value> {
        self.total_object_fetches.fetch_add(1, Ordering::SeqCst);
        *self
            .object_fetches
            .write()
            .await
            .entry(id.to_string())
            .or_insert(0) += 1;
        self.simulate_latency().await;

        let should_fail = self
            .fail_next_objects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ConnectorError::ConnectionFailed(
                "injected failure".to_string(),
            ));
        }

        let objects = self.objects.read().await;
        let envelope = objects
            .get(id)
            .ok_or_else(|| ConnectorError::NotFound(format!("objects/{}", id)))?;

        let Some(names) = properties else {
            return Ok(envelope.clone());
        };

        let filtered: Map<String, Value> = envelope
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(key, _)| key.starts_with('_') || names.iter().any(|n| n == *key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Value::Object(filtered))
    }

    async fn get_page(
        &self,
        id: &str,
        property: &str,
        begin: u64,
        page_size: u32,
    ) -> ConnectorResult<Value> {
        let key = (id.to_string(), property.to_string());
        let served_pages = {
            let mut requests = self.page_requests.write().await;
            requests.push(PageRequest {
                id: id.to_string(),
                property: property.to_string(),
                begin,
                page_size,
            });
            requests
                .iter()
                .filter(|r| r.id == id && r.property == property)
                .count() as u64
                - 1
        };
        self.simulate_latency().await;
        self.apply_scheduled_change(&key, served_pages).await;

        let collections = self.collections.read().await;
        let items = collections
            .get(&key)
            .ok_or_else(|| ConnectorError::NotFound(format!("objects/{}/{}", id, property)))?;

        let total = items.len() as u64;
        let start = begin.min(total) as usize;
        let end = (begin + u64::from(page_size)).min(total) as usize;
        let next = if (end as u64) < total {
            Value::String(format!(
                "/objects/{}/{}?begin={}&pageSize={}",
                id, property, end, page_size
            ))
        } else {
            Value::Null
        };

        Ok(json!({
            "items": items[start..end].to_vec(),
            "paging": {
                "numTotal": total,
                "pageSize": page_size,
                "begin": start,
                "end": end,
                "next": next,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(id: &str) -> Value {
        json!({"_id": id, "_type": "column", "_name": id})
    }

    #[tokio::test]
    async fn test_object_property_filter_keeps_header() {
        let mock = MockCatalogTransport::new("mock").with_object(json!({
            "_id": "t1", "_type": "table", "_name": "orders",
            "name": "orders", "owner": {"_id": "u1", "_type": "user"}
        }));

        let partial = mock
            .get_object("t1", Some(&["name".to_string()]))
            .await
            .unwrap();
        assert_eq!(partial["_name"], "orders");
        assert_eq!(partial["name"], "orders");
        assert!(partial.get("owner").is_none());
        assert_eq!(mock.object_fetch_count("t1").await, 1);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let mock = MockCatalogTransport::new("mock");
        let err = mock.get_object("nope", None).await.unwrap_err();
        assert!(matches!(err, ConnectorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_page_slicing_and_total() {
        let mock = MockCatalogTransport::new("mock").with_collection(
            "t1",
            "columns",
            (1..=5).map(|i| stub(&format!("c{}", i))).collect(),
        );

        let page = mock.get_page("t1", "columns", 4, 2).await.unwrap();
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["paging"]["numTotal"], 5);
        assert!(page["paging"]["next"].is_null());
        assert_eq!(mock.page_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let mock = MockCatalogTransport::new("mock").with_object(stub("c1"));
        mock.fail_next_object_fetches(1);

        assert!(mock.get_object("c1", None).await.is_err());
        assert!(mock.get_object("c1", None).await.is_ok());
        assert_eq!(mock.total_object_fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_scheduled_change_applies_after_pages() {
        let mock = MockCatalogTransport::new("mock").with_collection(
            "t1",
            "columns",
            vec![stub("c1"), stub("c2")],
        );
        mock.schedule_collection_change("t1", "columns", 1, vec![stub("c1")])
            .await;

        let first = mock.get_page("t1", "columns", 0, 1).await.unwrap();
        assert_eq!(first["paging"]["numTotal"], 2);
        let second = mock.get_page("t1", "columns", 1, 1).await.unwrap();
        assert_eq!(second["paging"]["numTotal"], 1);
    }
}
