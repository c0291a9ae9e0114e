//! Public address resolution
//!
//! The resolver asks an [`AddressSource`] for every active family in
//! parallel and folds the results into an [`AddressSnapshot`]. A family that
//! fails, times out or answers with the wrong family is simply absent from
//! the snapshot; resolution itself never fails.
//!
//! Each request runs in its own `resolve` span carrying the family and a
//! fresh request id, so interleaved log lines of the two families stay
//! distinguishable.

use crate::config::ResolutionConfig;
use crate::model::{AddressFamily, AddressSnapshot};
use crate::traits::AddressSource;
use futures::future::join_all;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span, warn};

/// Resolves the host's public addresses, one request per active family
pub struct AddressResolver {
    /// Echo service client
    source: Arc<dyn AddressSource>,

    /// Per-family activation, timeouts and log levels
    config: ResolutionConfig,
}

impl AddressResolver {
    /// Create a resolver
    pub fn new(source: Arc<dyn AddressSource>, config: ResolutionConfig) -> Self {
        Self { source, config }
    }

    /// Resolution settings in use
    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Resolve every active family concurrently
    ///
    /// Inactive families are never requested. The returned snapshot contains
    /// exactly the families that answered in time with an address of the
    /// right family.
    pub async fn resolve(&self) -> AddressSnapshot {
        let requests = self.config.active_families().into_iter().map(|family| {
            let span = info_span!(
                "resolve",
                family = %family,
                request_id = %uuid::Uuid::new_v4()
            );
            self.resolve_family(family).instrument(span)
        });

        join_all(requests).await.into_iter().flatten().collect()
    }

    /// Resolve a single family, absorbing every failure into `None`
    async fn resolve_family(&self, family: AddressFamily) -> Option<IpAddr> {
        let timeout = self.config.timeout_for(family);
        debug!("Requesting {} address via {} (timeout {:?})", family, self.source.source_name(), timeout);

        let result = match tokio::time::timeout(timeout, self.source.fetch(family)).await {
            Ok(Ok(ip)) if AddressFamily::of(&ip) == family => Ok(ip),
            Ok(Ok(ip)) => Err(format!("echo service returned {} address {}", AddressFamily::of(&ip), ip)),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("no answer within {:?}", timeout)),
        };

        match result {
            Ok(ip) => {
                debug!("Resolved {} address {} via {}", family, ip, self.source.source_name());
                Some(ip)
            }
            Err(reason) => {
                if self.config.family(family).warn_on_failure {
                    warn!("Failed to resolve {} address: {}", family, reason);
                } else {
                    debug!("Failed to resolve {} address: {}", family, reason);
                }
                None
            }
        }
    }
}
