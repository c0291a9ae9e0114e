// # Zone Directory Trait
//
// Defines the interface to a DNS provider's zone and record API, reduced to
// what compare-and-patch needs.
//
// ## Implementations
//
// - Cloudflare v4 API: `cfddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::ZoneDirectory;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let directory = /* ZoneDirectory implementation */;
//
//     let zone_id = directory.find_zone("example.com").await?;
//     for record in directory.list_records(&zone_id, "home.example.com").await? {
//         println!("{} {} {}", record.record_type, record.name, record.content);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A DNS record as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-specific record id
    pub id: String,
    /// Record type ("A", "AAAA", "CNAME", ...)
    pub record_type: String,
    /// Fully qualified record name
    pub name: String,
    /// Record content as the provider stores it
    pub content: String,
}

impl DnsRecord {
    /// Create a record
    ///
    /// Public for use by directory implementations and tests.
    pub fn new(
        id: impl Into<String>,
        record_type: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            record_type: record_type.into(),
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Trait for zone directory implementations
///
/// Directories are stateless request wrappers: one method call is one API
/// request. They never decide whether a patch is needed, never create
/// records and never retry. The reconciler owns those decisions, and the
/// watch loop owns retry.
///
/// # Thread Safety
///
/// Patches for both families may run concurrently on the same instance.
#[async_trait]
pub trait ZoneDirectory: Send + Sync {
    /// Resolve a zone name to the provider's zone id
    ///
    /// Returns `Error::NotFound` if no zone carries that name.
    async fn find_zone(&self, zone_name: &str) -> Result<String, crate::Error>;

    /// List every record named `name` in the zone, of any type
    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Replace the content of an existing record, leaving every other field
    async fn patch_record(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
    ) -> Result<(), crate::Error>;

    /// Short name for logs (e.g. "cloudflare")
    fn provider_name(&self) -> &'static str;
}
