//! Integration tests for the REST catalog transport against a local fixture server.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cw_connectors::testing::test_connector_config;
use cw_connectors::{
    AuthConfig, CatalogTransport, ConnectorError, HttpCatalogTransport, SecureString,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct FixtureState {
    flaky_calls: Arc<AtomicU32>,
}

async fn get_type(Path(type_id): Path<String>) -> Response {
    if type_id == "table" {
        Json(json!({"_id": "table", "_name": "Table", "properties": []})).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn get_object(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if id == "secret" {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "Bearer letmein")
            .unwrap_or(false);
        if !authorized {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    Json(json!({
        "_id": id,
        "_type": "table",
        "requested": params.get("properties").cloned().unwrap_or_default(),
    }))
    .into_response()
}

async fn get_page(
    Path((id, property)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    Json(json!({
        "items": [{"_id": format!("{}-{}", id, property), "_type": "column"}],
        "paging": {
            "numTotal": 1,
            "begin": params.get("begin"),
            "pageSize": params.get("pageSize"),
        }
    }))
}

async fn flaky(State(state): State<FixtureState>, Path(id): Path<String>) -> Response {
    if state.flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(json!({"_id": id, "_type": "table"})).into_response()
}

async fn spawn_fixture_server(state: FixtureState) -> String {
    let app = Router::new()
        .route("/api/types/:type_id", get(get_type))
        .route("/api/objects/:id", get(get_object))
        .route("/api/objects/:id/:property", get(get_page))
        .route("/flaky/objects/:id", get(flaky))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_get_type_and_not_found() {
    let base = spawn_fixture_server(FixtureState::default()).await;
    let transport =
        HttpCatalogTransport::new(test_connector_config("fixture", &format!("{}/api", base)))
            .unwrap();

    let schema = transport.get_type("table").await.unwrap();
    assert_eq!(schema["_name"], "Table");

    let err = transport.get_type("missing").await.unwrap_err();
    assert!(matches!(err, ConnectorError::NotFound(_)));
}

#[tokio::test]
async fn test_get_object_sends_property_list() {
    let base = spawn_fixture_server(FixtureState::default()).await;
    let transport =
        HttpCatalogTransport::new(test_connector_config("fixture", &format!("{}/api", base)))
            .unwrap();

    let props = vec!["name".to_string(), "owner".to_string()];
    let envelope = transport.get_object("t1", Some(&props)).await.unwrap();
    assert_eq!(envelope["requested"], "name,owner");

    let envelope = transport.get_object("t1", None).await.unwrap();
    assert_eq!(envelope["requested"], "");
}

#[tokio::test]
async fn test_get_page_sends_offset_and_size() {
    let base = spawn_fixture_server(FixtureState::default()).await;
    let transport =
        HttpCatalogTransport::new(test_connector_config("fixture", &format!("{}/api", base)))
            .unwrap();

    let page = transport.get_page("t1", "columns", 10, 25).await.unwrap();
    assert_eq!(page["items"][0]["_id"], "t1-columns");
    assert_eq!(page["paging"]["begin"], "10");
    assert_eq!(page["paging"]["pageSize"], "25");
}

#[tokio::test]
async fn test_bearer_token_injected() {
    let base = spawn_fixture_server(FixtureState::default()).await;

    let anonymous =
        HttpCatalogTransport::new(test_connector_config("fixture", &format!("{}/api", base)))
            .unwrap();
    let err = anonymous.get_object("secret", None).await.unwrap_err();
    assert!(matches!(err, ConnectorError::AuthenticationFailed(_)));

    let mut config = test_connector_config("fixture", &format!("{}/api", base));
    config.auth = AuthConfig::BearerToken {
        token: SecureString::from("letmein"),
    };
    let authed = HttpCatalogTransport::new(config).unwrap();
    assert!(authed.get_object("secret", None).await.is_ok());
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let state = FixtureState::default();
    let base = spawn_fixture_server(state.clone()).await;

    let mut config = test_connector_config("fixture", &format!("{}/flaky", base));
    config.max_retries = 2;
    let transport = HttpCatalogTransport::new(config).unwrap();

    let envelope = transport.get_object("t1", None).await.unwrap();
    assert_eq!(envelope["_id"], "t1");
    assert_eq!(state.flaky_calls.load(Ordering::SeqCst), 2);
}
