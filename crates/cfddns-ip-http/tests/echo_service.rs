//! HttpAddressSource against a mock echo service

use cfddns_core::{AddressFamily, AddressSource, FamilyConfig, ResolutionConfig};
use cfddns_ip_http::HttpAddressSource;
use std::net::IpAddr;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source_for(server: &MockServer, contact: Option<&str>) -> HttpAddressSource {
    let mut config = ResolutionConfig::default()
        .with_timeout(Duration::from_millis(300))
        .with_ipv4(FamilyConfig::default().with_url(format!("{}/v4", server.uri())))
        .with_ipv6(FamilyConfig::default().with_url(format!("{}/v6", server.uri())));
    config.contact_email = contact.map(str::to_string);

    HttpAddressSource::new(&config).expect("client builds")
}

#[tokio::test]
async fn parses_trimmed_plain_text_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.5\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v6"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  2001:db8::1  "))
        .mount(&server)
        .await;

    let source = source_for(&server, None);

    let v4 = source.fetch(AddressFamily::IPv4).await.unwrap();
    let v6 = source.fetch(AddressFamily::IPv6).await.unwrap();

    assert_eq!(v4, "203.0.113.5".parse::<IpAddr>().unwrap());
    assert_eq!(v6, "2001:db8::1".parse::<IpAddr>().unwrap());
}

#[tokio::test]
async fn sends_contact_in_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4"))
        .and(header(
            "user-agent",
            concat!("cfddns/", env!("CARGO_PKG_VERSION"), " (+mailto:ops@example.com)"),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.5"))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_for(&server, Some("ops@example.com"));

    assert!(source.fetch(AddressFamily::IPv4).await.is_ok());
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4"))
        .respond_with(ResponseTemplate::new(503).set_body_string("203.0.113.5"))
        .mount(&server)
        .await;

    let source = source_for(&server, None);
    let err = source.fetch(AddressFamily::IPv4).await.unwrap_err();

    assert!(err.to_string().contains("503"), "unexpected error: {}", err);
}

#[tokio::test]
async fn unparseable_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
        .mount(&server)
        .await;

    let source = source_for(&server, None);

    assert!(source.fetch(AddressFamily::IPv4).await.is_err());
}

#[tokio::test]
async fn wrong_family_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v6"))
        .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.5"))
        .mount(&server)
        .await;

    let source = source_for(&server, None);
    let err = source.fetch(AddressFamily::IPv6).await.unwrap_err();

    assert!(err.to_string().contains("Expected IPv6"), "unexpected error: {}", err);
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("203.0.113.5")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let source = source_for(&server, None);

    assert!(source.fetch(AddressFamily::IPv4).await.is_err());
}
