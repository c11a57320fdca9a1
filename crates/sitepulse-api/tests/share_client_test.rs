// Integration tests for `ShareApiClient` using wiremock.

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitepulse_api::{Error, ShareApiClient};

async fn setup() -> (MockServer, ShareApiClient) {
    let server = MockServer::start().await;
    let client = ShareApiClient::from_reqwest(&server.uri(), reqwest::Client::new())
        .expect("mock server URI should parse");
    (server, client)
}

#[tokio::test]
async fn fetch_share_returns_record() {
    let (server, client) = setup().await;

    let id = Uuid::new_v4();
    let body = json!({
        "id": id,
        "kind": "member",
        "active": true,
        "expiresAt": "2026-12-31T00:00:00Z",
        "accessCount": 7
    });

    Mock::given(method("GET"))
        .and(path("/v1/shares/tok_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let record = client
        .fetch_share("tok_abc")
        .await
        .expect("request should succeed")
        .expect("record should exist");

    assert_eq!(record.id, id);
    assert_eq!(record.kind, "member");
    assert!(record.active);
    assert_eq!(record.access_count, 7);
    assert!(record.expires_at.is_some());
}

#[tokio::test]
async fn fetch_share_maps_404_to_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/shares/tok_missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let record = client
        .fetch_share("tok_missing")
        .await
        .expect("404 is an outcome, not an error");
    assert!(record.is_none());
}

#[tokio::test]
async fn fetch_share_surfaces_backend_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/shares/tok_boom"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "storage offline" })),
        )
        .mount(&server)
        .await;

    let err = client.fetch_share("tok_boom").await.unwrap_err();
    match err {
        Error::ShareApi { message, status } => {
            assert_eq!(status, 500);
            assert_eq!(message, "storage offline");
        }
        other => panic!("expected ShareApi error, got {other:?}"),
    }
}

#[tokio::test]
async fn record_access_posts_to_backend() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/shares/tok_abc/access"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .record_access("tok_abc")
        .await
        .expect("increment should succeed");
}

#[tokio::test]
async fn record_access_failure_is_an_error_for_this_layer() {
    // The validator swallows this; the transport client itself reports it.
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/shares/tok_abc/access"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(client.record_access("tok_abc").await.is_err());
}
