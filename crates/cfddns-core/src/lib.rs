// # cfddns-core
//
// Core library for the cfddns dynamic DNS daemon.
//
// ## Architecture Overview
//
// This library keeps a zone's A/AAAA records in line with the host's public
// addresses:
// - **AddressSource**: Trait for asking an echo service for the public address
// - **ZoneDirectory**: Trait for zone lookup, record listing and record patching
// - **AddressResolver**: Parallel per-family resolution into an `AddressSnapshot`
// - **Reconciler**: Compare-and-patch against the live records of the zone
// - **Watcher**: Periodic loop with per-cycle deadline and failure policy
//
// ## Design Principles
//
// 1. **Live comparison**: Records are compared against the provider on every cycle
// 2. **Partial failure as data**: Per-family problems become `UpdateOutcome`s
// 3. **Single writer**: Only the watch loop mutates watcher state
// 4. **Library-First**: The daemon is a thin layer over this crate

pub mod config;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod resolver;
pub mod traits;
pub mod watcher;

// Re-export core types for convenience
pub use config::{
    CloudflareConfig, DdnsConfig, FailureAction, FailurePolicy, FamilyConfig, RecordConfig,
    ResolutionConfig, WatcherConfig,
};
pub use error::{Error, Result};
pub use model::{AddressFamily, AddressSnapshot, Outcomes, RecordDescriptor, UpdateOutcome, ZoneRecordSet};
pub use reconciler::Reconciler;
pub use resolver::AddressResolver;
pub use traits::{AddressSource, DnsRecord, ZoneDirectory};
pub use watcher::{LoopPhase, StatusReader, StopReason, Watcher, WatcherEvent, WatcherHandle, WatcherStatus};
