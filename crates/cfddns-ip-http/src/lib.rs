// # HTTP Address Source
//
// This crate provides the `AddressSource` used by cfddns: it asks a public
// echo service (ipify or anything answering the same way) which address the
// request came from.
//
// ## Protocol
//
// `GET <url>` answers `200 OK` with the bare address as plain text, e.g.
// `203.0.113.5\n`. No authentication. A `User-Agent` carrying a contact
// e-mail is sent when one is configured, as some services ask for it.
//
// ## Families
//
// Each family has its own URL. The defaults point at single-stack hosts
// (`api4.ipify.org`, `api6.ipify.org`) so the connection itself is forced
// onto the requested family.

use cfddns_core::{AddressFamily, AddressSource, Error, ResolutionConfig, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Default IPv4 echo service
pub const DEFAULT_IPV4_URL: &str = "https://api4.ipify.org";

/// Default IPv6 echo service
pub const DEFAULT_IPV6_URL: &str = "https://api6.ipify.org";

/// HTTP echo-service client
#[derive(Debug, Clone)]
pub struct HttpAddressSource {
    /// IPv4 echo URL
    ipv4_url: String,

    /// IPv6 echo URL
    ipv6_url: String,

    /// Per-request timeouts
    ipv4_timeout: Duration,
    ipv6_timeout: Duration,

    /// HTTP client, shared across families and cycles
    client: reqwest::Client,
}

impl HttpAddressSource {
    /// Create a source from the resolution settings
    ///
    /// Families without a URL override use the ipify defaults.
    pub fn new(config: &ResolutionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent(config.contact_email.as_deref()))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            ipv4_url: config
                .ipv4
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_IPV4_URL.to_string()),
            ipv6_url: config
                .ipv6
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_IPV6_URL.to_string()),
            ipv4_timeout: config.timeout_for(AddressFamily::IPv4),
            ipv6_timeout: config.timeout_for(AddressFamily::IPv6),
            client,
        })
    }

    /// Echo URL used for `family`
    pub fn url(&self, family: AddressFamily) -> &str {
        match family {
            AddressFamily::IPv4 => &self.ipv4_url,
            AddressFamily::IPv6 => &self.ipv6_url,
        }
    }

    fn timeout(&self, family: AddressFamily) -> Duration {
        match family {
            AddressFamily::IPv4 => self.ipv4_timeout,
            AddressFamily::IPv6 => self.ipv6_timeout,
        }
    }
}

#[async_trait::async_trait]
impl AddressSource for HttpAddressSource {
    async fn fetch(&self, family: AddressFamily) -> Result<IpAddr> {
        let url = self.url(family);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout(family))
            .send()
            .await
            .map_err(|e| Error::resolution(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::resolution(format!("{} answered HTTP {}", url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::resolution(format!("Failed to read response from {}: {}", url, e)))?;

        let text = body.trim();
        let ip: IpAddr = text
            .parse()
            .map_err(|_| Error::resolution(format!("Invalid IP address from {}: {:?}", url, text)))?;

        if AddressFamily::of(&ip) != family {
            return Err(Error::resolution(format!(
                "Expected {} from {}, got: {}",
                family, url, ip
            )));
        }

        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

fn user_agent(contact_email: Option<&str>) -> String {
    let base = concat!("cfddns/", env!("CARGO_PKG_VERSION"));
    match contact_email {
        Some(email) if !email.is_empty() => format!("{} (+mailto:{})", base, email),
        _ => base.to_string(),
    }
}
