//! Integration tests for paging through relationship collections.
//!
//! Validates ordering, page-size independence, de-duplication within a
//! pass, independent cursors, and halting when the catalog's view of a
//! collection changes mid-pass.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use cw_connectors::testing::{collection_relationship, reference_stub, scalar_property, type_schema};
use cw_connectors::{CatalogTransport, ConnectorResult, MockCatalogTransport};
use cw_core::{
    CatalogClient, CatalogError, CollectionOptions, Page, PagedCollection, Reference, Warning,
};
use serde_json::{json, Value};

// ============================================================================
// Fixtures
// ============================================================================

fn stubs(ids: &[&str]) -> Vec<Value> {
    ids.iter()
        .map(|id| reference_stub(id, "column", &format!("col_{}", id)))
        .collect()
}

fn catalog_with_columns(ids: &[&str]) -> MockCatalogTransport {
    MockCatalogTransport::new("fixture")
        .with_type(type_schema(
            "table",
            "Table",
            vec![
                scalar_property("name", "string"),
                collection_relationship("columns", "column"),
            ],
        ))
        .with_collection("t1", "columns", stubs(ids))
}

fn columns_of_t1() -> PagedCollection {
    PagedCollection::new(
        Reference::new("t1", "table"),
        "columns",
        Some("column".to_string()),
    )
}

fn ids(items: &[cw_core::CollectionItem]) -> Vec<String> {
    items.iter().map(|item| item.id().to_string()).collect()
}

/// Reports a fixed total but serves nothing past the first page.
struct TruncatingTransport;

#[async_trait]
impl CatalogTransport for TruncatingTransport {
    fn name(&self) -> &str {
        "truncating"
    }

    async fn get_type(&self, type_id: &str) -> ConnectorResult<Value> {
        Ok(type_schema(type_id, type_id, vec![]))
    }

    async fn get_object(&self, id: &str, _properties: Option<&[String]>) -> ConnectorResult<Value> {
        Ok(json!({"_id": id, "_type": "table"}))
    }

    async fn get_page(
        &self,
        _id: &str,
        _property: &str,
        begin: u64,
        _page_size: u32,
    ) -> ConnectorResult<Value> {
        let items = if begin == 0 { stubs(&["c1", "c2"]) } else { Vec::new() };
        Ok(json!({"items": items, "paging": {"numTotal": 5, "begin": begin}}))
    }
}

/// Omits the total on the first page and reports shifting totals afterwards.
struct UntotalledTransport;

#[async_trait]
impl CatalogTransport for UntotalledTransport {
    fn name(&self) -> &str {
        "untotalled"
    }

    async fn get_type(&self, type_id: &str) -> ConnectorResult<Value> {
        Ok(type_schema(type_id, type_id, vec![]))
    }

    async fn get_object(&self, id: &str, _properties: Option<&[String]>) -> ConnectorResult<Value> {
        Ok(json!({"_id": id, "_type": "table"}))
    }

    async fn get_page(
        &self,
        _id: &str,
        _property: &str,
        begin: u64,
        _page_size: u32,
    ) -> ConnectorResult<Value> {
        Ok(match begin {
            0 => json!({"items": stubs(&["c1", "c2"]), "paging": {"begin": 0, "next": "more"}}),
            2 => json!({
                "items": stubs(&["c3", "c4"]),
                "paging": {"numTotal": 9, "begin": 2, "next": "more"}
            }),
            4 => json!({"items": stubs(&["c5"]), "paging": {"numTotal": 5, "begin": 4}}),
            _ => json!({"items": [], "paging": {"begin": begin}}),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_page_size_does_not_change_members() {
    let members = ["c1", "c2", "c3", "c4", "c5", "c6", "c7"];

    let mut seen = Vec::new();
    for page_size in [1, 3, 1000] {
        let transport = Arc::new(catalog_with_columns(&members));
        let client = CatalogClient::new(transport.clone());

        let items = client
            .iterate_with(
                columns_of_t1(),
                CollectionOptions::default().with_page_size(page_size),
            )
            .collect_all()
            .await
            .unwrap();

        let expected_requests = members.len().div_ceil(page_size as usize);
        assert_eq!(transport.page_requests().await.len(), expected_requests);
        seen.push(ids(&items));
    }

    assert_eq!(seen[0], members);
    assert!(seen.iter().all(|pass| pass == &seen[0]));
}

#[tokio::test]
async fn test_pages_requested_in_offset_order() {
    let transport = Arc::new(catalog_with_columns(&["c1", "c2", "c3", "c4", "c5"]));
    let client = CatalogClient::new(transport.clone());

    client
        .iterate_with(columns_of_t1(), CollectionOptions::default().with_page_size(2))
        .collect_all()
        .await
        .unwrap();

    let requests = transport.page_requests().await;
    let offsets: Vec<u64> = requests.iter().map(|r| r.begin).collect();
    assert_eq!(offsets, vec![0, 2, 4]);
    assert!(requests.iter().all(|r| r.page_size == 2 && r.property == "columns"));
}

#[tokio::test]
async fn test_duplicates_across_pages_are_dropped() {
    let transport = Arc::new(catalog_with_columns(&["c1", "c2", "c2", "c3"]));
    let client = CatalogClient::new(transport);

    let mut cursor =
        client.iterate_with(columns_of_t1(), CollectionOptions::default().with_page_size(2));
    let items = cursor.collect_all().await.unwrap();

    assert_eq!(ids(&items), vec!["c1", "c2", "c3"]);
    assert_eq!(
        cursor.warnings(),
        &[Warning::DuplicateInCollection {
            collection: "t1.columns".to_string(),
            id: "c2".to_string(),
            offset: 2,
        }]
    );
    assert_eq!(cursor.total(), Some(4));
}

#[tokio::test]
async fn test_growing_total_halts_the_pass() {
    let transport = Arc::new(catalog_with_columns(&["c1", "c2", "c3", "c4", "c5"]));
    transport
        .schedule_collection_change(
            "t1",
            "columns",
            1,
            stubs(&["c1", "c2", "c9", "c3", "c4", "c5"]),
        )
        .await;
    let client = CatalogClient::new(transport.clone());

    let mut cursor =
        client.iterate_with(columns_of_t1(), CollectionOptions::default().with_page_size(2));

    assert_eq!(cursor.next().await.unwrap().unwrap().id(), "c1");
    assert_eq!(cursor.next().await.unwrap().unwrap().id(), "c2");

    let err = cursor.next().await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::PaginationInconsistency { ref collection, offset: 2, .. }
            if collection == "t1.columns"
    ));
    assert!(cursor.is_halted());
    assert!(cursor.next().await.unwrap().is_none());
    assert_eq!(transport.page_requests().await.len(), 2);
}

#[tokio::test]
async fn test_empty_page_before_total_halts_the_pass() {
    let client = CatalogClient::new(Arc::new(TruncatingTransport));

    let mut cursor =
        client.iterate_with(columns_of_t1(), CollectionOptions::default().with_page_size(2));

    assert!(cursor.next().await.unwrap().is_some());
    assert!(cursor.next().await.unwrap().is_some());
    assert!(matches!(
        cursor.next().await,
        Err(CatalogError::PaginationInconsistency { offset: 2, .. })
    ));
    assert!(cursor.next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_independent_cursors_do_not_interfere() {
    let transport = Arc::new(catalog_with_columns(&["c1", "c2", "c3"]));
    let client = CatalogClient::new(transport);
    let options = CollectionOptions::default().with_page_size(1);

    let mut first = client.iterate_with(columns_of_t1(), options.clone());
    let mut second = client.iterate_with(columns_of_t1(), options);

    assert_eq!(first.next().await.unwrap().unwrap().id(), "c1");
    assert_eq!(first.next().await.unwrap().unwrap().id(), "c2");
    assert_eq!(second.next().await.unwrap().unwrap().id(), "c1");
    assert_eq!(first.next().await.unwrap().unwrap().id(), "c3");
    assert!(first.next().await.unwrap().is_none());

    assert_eq!(ids(&second.collect_all().await.unwrap()), vec!["c2", "c3"]);
    assert_eq!(first.position(), 3);
}

#[tokio::test]
async fn test_eager_partial_members() {
    let transport = Arc::new(
        catalog_with_columns(&["c1", "c2"])
            .with_type(type_schema(
                "column",
                "Column",
                vec![
                    scalar_property("name", "string"),
                    scalar_property("data_type", "string"),
                ],
            ))
            .with_object(json!({"_id": "c1", "_type": "column", "name": "id", "data_type": "int"}))
            .with_object(json!({"_id": "c2", "_type": "column", "name": "amt", "data_type": "dec"})),
    );
    let client = CatalogClient::new(transport.clone());

    let items = client
        .iterate_with(
            columns_of_t1(),
            CollectionOptions::default().eager_with(["name"]),
        )
        .collect_all()
        .await
        .unwrap();

    let names: BTreeSet<String> = items
        .into_iter()
        .filter_map(|item| item.into_detail())
        .map(|object| {
            assert!(object.get("data_type").is_err());
            object.name().unwrap_or_default().to_string()
        })
        .collect();
    assert_eq!(names, BTreeSet::from(["id".to_string(), "amt".to_string()]));
    // Partial loads never populate the identity cache.
    assert_eq!(client.cache_stats().size, 0);
}

#[tokio::test]
async fn test_inline_page_without_total_keeps_fetching() {
    let transport = Arc::new(catalog_with_columns(&["c1", "c2", "c3", "c4", "c5"]));
    let client = CatalogClient::new(transport.clone());
    let inline = Page::parse(&json!({"items": stubs(&["c1", "c2"]), "paging": {}})).unwrap();
    assert_eq!(inline.num_total, None);
    let collection = PagedCollection::from_inline(
        Reference::new("t1", "table"),
        "columns",
        Some("column".to_string()),
        inline,
    );

    let items = client
        .iterate_with(collection, CollectionOptions::default())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(ids(&items), vec!["c1", "c2", "c3", "c4", "c5"]);
    let requests = transport.page_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].begin, 2);
}

#[tokio::test]
async fn test_later_totals_are_advisory_without_first_page_total() {
    let client = CatalogClient::new(Arc::new(UntotalledTransport));

    let mut cursor =
        client.iterate_with(columns_of_t1(), CollectionOptions::default().with_page_size(2));
    let items = cursor.collect_all().await.unwrap();

    assert_eq!(ids(&items), vec!["c1", "c2", "c3", "c4", "c5"]);
    assert!(!cursor.is_halted());
    assert_eq!(cursor.total(), None);
    assert!(cursor.warnings().is_empty());
    assert_eq!(cursor.position(), 5);
}
