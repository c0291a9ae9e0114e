//! Core traits for cfddns
//!
//! This module defines the two collaborators the resolver and the reconciler
//! talk to.
//!
//! - [`AddressSource`]: Ask an external echo service for the public address
//! - [`ZoneDirectory`]: Look up a zone, list its records and patch one of them

pub mod address_source;
pub mod zone_directory;

pub use address_source::AddressSource;
pub use zone_directory::{DnsRecord, ZoneDirectory};
