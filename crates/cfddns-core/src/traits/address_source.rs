// # Address Source Trait
//
// Defines the interface for discovering the host's public address of one
// family.
//
// ## Implementations
//
// - HTTP echo services (ipify and compatibles): `cfddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::{AddressFamily, AddressSource};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* AddressSource implementation */;
//
//     let v4 = source.fetch(AddressFamily::IPv4).await?;
//     println!("public IPv4: {}", v4);
//
//     Ok(())
// }
// ```

use crate::model::AddressFamily;
use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for public address sources
///
/// One call is one request. Sources do not retry, cache or apply their own
/// deadline beyond the transport timeout; the resolver bounds each call and
/// turns failures into an absent family.
///
/// # Contract
///
/// A returned address must belong to the requested family. Returning an
/// address of the other family is treated as a failure by the resolver.
///
/// # Thread Safety
///
/// Both families are fetched concurrently through the same instance.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Fetch the current public address for `family`
    async fn fetch(&self, family: AddressFamily) -> Result<IpAddr, crate::Error>;

    /// Short name for logs (e.g. "http")
    fn source_name(&self) -> &'static str;
}
