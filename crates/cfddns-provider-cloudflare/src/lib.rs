// # Cloudflare Zone Directory
//
// This crate provides the Cloudflare API v4 implementation of cfddns's
// `ZoneDirectory`.
//
// ## Scope
//
// - One HTTP request per trait call, no retry, no caching
// - Records are only ever patched, never created or deleted
// - Errors map to specific `Error` variants by HTTP status; the API's
//   `errors` array is surfaced in the message
// - Dry-run mode: lookups are real, patches are logged and reported as
//   successful without being sent
//
// ## Security Requirements
//
// - The API token or key never appears in logs or `Debug` output
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`
//
// ## Authentication
//
// `Authorization: Bearer <token>` by default. When an account e-mail is
// configured, the legacy global key headers `X-Auth-Email` / `X-Auth-Key`
// are sent instead.

mod dto;

use async_trait::async_trait;
use cfddns_core::{CloudflareConfig, DnsRecord, Error, Result, ZoneDirectory};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::dto::{ContentPatch, Envelope, ErrorBody, Record, Zone};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// HTTP timeout for API requests; the watch loop's cycle deadline is the real bound
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// How requests authenticate
#[derive(Clone)]
enum Credentials {
    /// Scoped API token
    Token(String),
    /// Global API key bound to an account e-mail
    GlobalKey { email: String, key: String },
}

/// Cloudflare API v4 client
///
/// Stateless apart from the shared HTTP connection pool; safe to use from
/// concurrent patches.
pub struct CloudflareClient {
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// API base URL without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: perform GET requests but skip PATCH
    dry_run: bool,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match &self.credentials {
            Credentials::Token(_) => "token",
            Credentials::GlobalKey { .. } => "global-key",
        };
        f.debug_struct("CloudflareClient")
            .field("credentials", &format_args!("<REDACTED {}>", auth))
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// `Error::Config` if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &CloudflareConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let credentials = match &config.email {
            Some(email) => Credentials::GlobalKey {
                email: email.clone(),
                key: config.api_token.clone(),
            },
            None => Credentials::Token(config.api_token.clone()),
        };

        let api_base = config
            .api_base
            .as_deref()
            .unwrap_or(CLOUDFLARE_API_BASE)
            .trim_end_matches('/')
            .to_string();

        if config.dry_run {
            tracing::warn!("Cloudflare client running in DRY-RUN mode - no records will be changed");
        }

        Ok(Self {
            credentials,
            api_base,
            client,
            dry_run: config.dry_run,
        })
    }

    /// Whether patches are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::GlobalKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    /// Send a request and decode the `result` of a successful envelope
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response, what).await);
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse {} response: {}", what, e)))?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{} failed: {}", what, dto::describe(&envelope.errors)),
            ));
        }

        envelope
            .result
            .ok_or_else(|| Error::provider(PROVIDER, format!("{} response has no result", what)))
    }
}

/// Map a non-2xx response to an error, keeping the API's own messages
async fn status_error(status: StatusCode, response: Response, what: &str) -> Error {
    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) if !parsed.errors.is_empty() => dto::describe(&parsed.errors),
        _ if body.trim().is_empty() => "no error details".to_string(),
        _ => body.trim().to_string(),
    };

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid credentials or insufficient permissions ({}): {}",
            what, status, detail
        )),
        404 => Error::not_found(format!("{}: {}", what, detail)),
        429 => Error::rate_limited(format!("{} ({}): {}", what, status, detail)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("{}: server error (transient) {}: {}", what, status, detail),
        ),
        _ => Error::provider(PROVIDER, format!("{} failed ({}): {}", what, status, detail)),
    }
}

#[async_trait]
impl ZoneDirectory for CloudflareClient {
    /// ```http
    /// GET /zones?name=example.com
    /// ```
    async fn find_zone(&self, zone_name: &str) -> Result<String> {
        tracing::debug!("Looking up zone ID for {}", zone_name);

        let request = self
            .client
            .get(format!("{}/zones", self.api_base))
            .query(&[("name", zone_name)]);
        let zones: Vec<Zone> = self.call(request, "Zone lookup").await?;

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone_name)))?;

        tracing::debug!("Found zone {} ({})", zone.name, zone.id);
        Ok(zone.id)
    }

    /// ```http
    /// GET /zones/:zone_id/dns_records?name=home.example.com
    /// ```
    async fn list_records(&self, zone_id: &str, name: &str) -> Result<Vec<DnsRecord>> {
        tracing::debug!("Listing records named {} in zone {}", name, zone_id);

        let request = self
            .client
            .get(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
            .query(&[("name", name)]);
        let records: Vec<Record> = self.call(request, "Record lookup").await?;

        Ok(records
            .into_iter()
            .map(|r| DnsRecord::new(r.id, r.record_type, r.name, r.content))
            .collect())
    }

    /// ```http
    /// PATCH /zones/:zone_id/dns_records/:record_id
    /// {"content": "203.0.113.5"}
    /// ```
    async fn patch_record(&self, zone_id: &str, record_id: &str, content: &str) -> Result<()> {
        let url = format!("{}/zones/{}/dns_records/{}", self.api_base, zone_id, record_id);
        let payload = ContentPatch { content };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PATCH request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(());
        }

        let request = self.client.patch(&url).json(&payload);
        let _: serde_json::Value = self.call(request, "Record update").await?;

        tracing::debug!("Patched record {} with {}", record_id, content);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
