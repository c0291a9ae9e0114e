//! CloudflareClient against a mock Cloudflare API

use cfddns_core::{CloudflareConfig, Error, ZoneDirectory};
use cfddns_provider_cloudflare::CloudflareClient;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, config: CloudflareConfig) -> CloudflareClient {
    CloudflareClient::new(&config.with_api_base(format!("{}/client/v4", server.uri())))
        .expect("client builds")
}

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result,
    }))
}

#[tokio::test]
async fn find_zone_queries_by_name_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .and(query_param("name", "example.com"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ok(json!([{ "id": "023e105f4ecef8ad9ca31a8372d0c353", "name": "example.com" }])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, CloudflareConfig::new("test-token"));

    let zone_id = client.find_zone("example.com").await.unwrap();
    assert_eq!(zone_id, "023e105f4ecef8ad9ca31a8372d0c353");
}

#[tokio::test]
async fn global_key_auth_uses_legacy_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .and(header("x-auth-email", "ops@example.com"))
        .and(header("x-auth-key", "global-key"))
        .respond_with(ok(json!([{ "id": "zone-1", "name": "example.com" }])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(
        &server,
        CloudflareConfig::new("global-key").with_email("ops@example.com"),
    );

    assert_eq!(client.find_zone("example.com").await.unwrap(), "zone-1");
}

#[tokio::test]
async fn unknown_zone_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .respond_with(ok(json!([])))
        .mount(&server)
        .await;

    let client = client_for(&server, CloudflareConfig::new("test-token"));

    let err = client.find_zone("example.org").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn list_records_returns_every_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones/zone-1/dns_records"))
        .and(query_param("name", "home.example.com"))
        .respond_with(ok(json!([
            { "id": "rec-a", "type": "A", "name": "home.example.com", "content": "198.51.100.4", "ttl": 1 },
            { "id": "rec-aaaa", "type": "AAAA", "name": "home.example.com", "content": "2001:db8::4", "ttl": 1 },
            { "id": "rec-txt", "type": "TXT", "name": "home.example.com", "content": "hello" }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, CloudflareConfig::new("test-token"));

    let records = client.list_records("zone-1", "home.example.com").await.unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].id, "rec-a");
    assert_eq!(records[0].record_type, "A");
    assert_eq!(records[1].content, "2001:db8::4");
}

#[tokio::test]
async fn patch_sends_content_only() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/client/v4/zones/zone-1/dns_records/rec-a"))
        .and(body_json(json!({ "content": "203.0.113.5" })))
        .respond_with(ok(json!({
            "id": "rec-a", "type": "A", "name": "home.example.com", "content": "203.0.113.5"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, CloudflareConfig::new("test-token"));

    client.patch_record("zone-1", "rec-a", "203.0.113.5").await.unwrap();
}

#[tokio::test]
async fn dry_run_skips_patch() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, CloudflareConfig::new("test-token").with_dry_run(true));

    client.patch_record("zone-1", "rec-a", "203.0.113.5").await.unwrap();
}

#[tokio::test]
async fn error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "errors": [{ "code": 9109, "message": "Unauthorized to access requested resource" }],
            "result": null
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, CloudflareConfig::new("bad-token"));

    let err = client.find_zone("example.com").await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)), "unexpected error: {:?}", err);
    assert!(err.to_string().contains("[9109] Unauthorized to access requested resource"));
    assert!(!err.to_string().contains("bad-token"));
}

#[tokio::test]
async fn status_codes_map_to_error_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/client/v4/zones/zone-1/dns_records/limited"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/client/v4/zones/zone-1/dns_records/broken"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/client/v4/zones/zone-1/dns_records/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{ "code": 81044, "message": "Record does not exist." }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, CloudflareConfig::new("test-token"));

    let limited = client.patch_record("zone-1", "limited", "203.0.113.5").await.unwrap_err();
    let broken = client.patch_record("zone-1", "broken", "203.0.113.5").await.unwrap_err();
    let gone = client.patch_record("zone-1", "gone", "203.0.113.5").await.unwrap_err();

    assert!(matches!(limited, Error::RateLimited(_)), "unexpected error: {:?}", limited);
    assert!(matches!(broken, Error::Provider { .. }), "unexpected error: {:?}", broken);
    assert!(broken.to_string().contains("bad gateway"));
    assert!(matches!(gone, Error::NotFound(_)), "unexpected error: {:?}", gone);
    assert!(gone.to_string().contains("Record does not exist."));
}

#[tokio::test]
async fn unsuccessful_envelope_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones/zone-1/dns_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{ "code": 1003, "message": "Invalid or missing zone id." }],
            "result": null
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, CloudflareConfig::new("test-token"));

    let err = client.list_records("zone-1", "home.example.com").await.unwrap_err();
    assert!(err.to_string().contains("[1003] Invalid or missing zone id."));
}
