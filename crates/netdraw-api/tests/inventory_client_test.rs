// Integration tests for `InventoryClient` using wiremock.
#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use netdraw_api::{Error, InventoryClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, InventoryClient) {
    let server = MockServer::start().await;
    let client = InventoryClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_hosts_follows_next_links() {
    let (server, client) = setup().await;

    let first = json!({
        "count": 3,
        "next": "/api/v2/inventories/4/hosts/?page=2",
        "results": [
            { "id": 10, "name": "spine1", "variables": "ansible_topology:\n  type: switch\n" },
            { "id": 11, "name": "spine2", "variables": "" },
        ]
    });
    let second = json!({
        "count": 3,
        "next": null,
        "results": [
            { "id": 12, "name": "edge", "variables": "{\"ansible_topology\": {\"type\": \"router\"}}" },
        ]
    });

    Mock::given(method("GET"))
        .and(path("/api/v2/inventories/4/hosts/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&second))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/inventories/4/hosts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&first))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let hosts = client.list_hosts(4).await.unwrap();

    assert_eq!(hosts.len(), 3);
    assert_eq!(hosts[0].name, "spine1");
    assert_eq!(hosts[0].topology_type().as_deref(), Some("switch"));
    assert_eq!(hosts[1].topology_type(), None);
    assert_eq!(hosts[2].id, 12);
    assert_eq!(hosts[2].topology_type().as_deref(), Some("router"));
}

#[tokio::test]
async fn test_get_host() {
    let (server, client) = setup().await;

    let body = json!({
        "id": 42,
        "name": "leaf3",
        "description": "rack B",
        "inventory": 4,
        "enabled": true,
        "variables": "ansible_topology:\n  type: host\n"
    });

    Mock::given(method("GET"))
        .and(path("/api/v2/hosts/42/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let host = client.get_host(42).await.unwrap();

    assert_eq!(host.id, 42);
    assert_eq!(host.description, "rack B");
    assert_eq!(host.inventory, Some(4));
    assert_eq!(host.topology_type().as_deref(), Some("host"));
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;
    let transport = TransportConfig {
        token: Some(secrecy::SecretString::from("s3cret".to_string())),
        ..TransportConfig::default()
    };
    let client = InventoryClient::new(&server.uri(), &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v2/hosts/1/"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "name": "a" })))
        .mount(&server)
        .await;

    let host = client.get_host(1).await.unwrap();
    assert_eq!(host.name, "a");
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_not_found_maps_to_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/hosts/999/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Not found." })))
        .mount(&server)
        .await;

    let err = client.get_host(999).await.unwrap_err();
    assert!(err.is_not_found());
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not found.");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/inventories/1/hosts/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Authentication credentials were not provided." })),
        )
        .mount(&server)
        .await;

    let err = client.list_hosts(1).await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }));
}

#[tokio::test]
async fn test_garbage_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/hosts/5/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client.get_host(5).await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert!(body.contains("login")),
        other => panic!("expected Deserialization error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/hosts/7/"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = client.get_host(7).await.unwrap_err();
    assert!(err.is_transient());
}
