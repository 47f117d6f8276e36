//! Fixture builders for catalog documents.
//!
//! Produces type schemas, reference stubs, and inline pages in the same
//! shapes the catalog REST API returns, for use with
//! [`MockCatalogTransport`](crate::MockCatalogTransport).

use crate::traits::{AuthConfig, ConnectorConfig};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Creates a test connector config with sensible defaults.
pub fn test_connector_config(name: &str, base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        auth: AuthConfig::None,
        timeout_secs: 5,
        max_retries: 0,
        verify_tls: true,
        headers: HashMap::new(),
    }
}

/// A scalar property declaration (`kind` is e.g. `"string"`, `"date"`).
pub fn scalar_property(name: &str, kind: &str) -> Value {
    json!({"name": name, "displayName": name, "type": {"_id": kind}, "maxNumber": 1})
}

/// A single-valued relationship declaration.
pub fn single_relationship(name: &str, target_type: &str) -> Value {
    json!({"name": name, "displayName": name, "type": {"_id": target_type}, "maxNumber": 1})
}

/// A collection relationship declaration.
pub fn collection_relationship(name: &str, target_type: &str) -> Value {
    json!({"name": name, "displayName": name, "type": {"_id": target_type}, "maxNumber": -1})
}

/// A type schema document as served by `GET /types/{type_id}`.
pub fn type_schema(type_id: &str, display_name: &str, properties: Vec<Value>) -> Value {
    json!({"_id": type_id, "_name": display_name, "properties": properties})
}

/// A reference stub (`{_id, _type, _name}`).
pub fn reference_stub(id: &str, type_id: &str, name: &str) -> Value {
    json!({"_id": id, "_type": type_id, "_name": name})
}

/// An inline first page of a collection relationship.
pub fn inline_page(items: Vec<Value>, num_total: u64) -> Value {
    let end = items.len();
    json!({
        "items": items,
        "paging": {"numTotal": num_total, "begin": 0, "end": end}
    })
}
