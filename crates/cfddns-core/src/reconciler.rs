//! Compare-and-patch reconciliation
//!
//! The reconciler fetches the live A/AAAA records of the configured name,
//! compares them with a freshly resolved [`AddressSnapshot`] and patches only
//! the records that drifted.
//!
//! ## Flow
//!
//! ```text
//! AddressSnapshot ──┐
//!                   ▼
//!            ┌─────────────┐  find_zone / list_records  ┌───────────────┐
//!            │ Reconciler  │ ─────────────────────────▶ │ ZoneDirectory │
//!            └─────────────┘ ◀───────────────────────── └───────────────┘
//!                   │            ZoneRecordSet
//!                   ▼
//!     per family: RecordNotFound | UpToDate | patch ─▶ Updated | Failed
//! ```
//!
//! Failing to obtain the record set aborts the attempt with
//! `Error::Directory`. Everything after that point is per family and ends up
//! in the returned [`Outcomes`].

use crate::config::RecordConfig;
use crate::error::{Error, Result};
use crate::model::{AddressFamily, AddressSnapshot, Outcomes, RecordDescriptor, UpdateOutcome, ZoneRecordSet};
use crate::traits::ZoneDirectory;
use futures::future::join_all;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Brings the zone's A/AAAA records in line with a snapshot
pub struct Reconciler {
    /// Provider API client
    directory: Arc<dyn ZoneDirectory>,

    /// Zone and name of the managed records
    record: RecordConfig,
}

impl Reconciler {
    /// Create a reconciler for one record name
    pub fn new(directory: Arc<dyn ZoneDirectory>, record: RecordConfig) -> Self {
        Self { directory, record }
    }

    /// The managed record name
    pub fn record(&self) -> &RecordConfig {
        &self.record
    }

    /// Fetch the live record set of the configured name
    ///
    /// Records of other types are ignored. When several records of one type
    /// share the name, the first one listed wins.
    ///
    /// # Errors
    ///
    /// `Error::Directory` wrapping the collaborator error when the zone
    /// cannot be found or either request fails.
    pub async fn lookup_records(&self) -> Result<ZoneRecordSet> {
        let fqdn = self.record.fqdn();

        let zone_id = self
            .directory
            .find_zone(&self.record.zone_name)
            .await
            .map_err(Error::directory)?;
        let listed = self
            .directory
            .list_records(&zone_id, &fqdn)
            .await
            .map_err(Error::directory)?;

        let mut set = ZoneRecordSet::new(zone_id);
        for record in listed {
            let Some(family) = AddressFamily::from_record_type(&record.record_type) else {
                debug!("Ignoring {} record {} ({})", record.record_type, record.name, record.id);
                continue;
            };

            if set.records.contains_key(&family) {
                warn!(
                    "Multiple {} records named {}, using the first one; ignoring {}",
                    family.record_type(),
                    fqdn,
                    record.id
                );
                continue;
            }

            set.records.insert(
                family,
                RecordDescriptor {
                    id: record.id,
                    content: record.content,
                },
            );
        }

        debug!("Zone {} has {} managed record(s) for {}", set.zone_id, set.records.len(), fqdn);
        Ok(set)
    }

    /// Reconcile the live records against `current`
    ///
    /// Every family present in `current` gets exactly one outcome; absent
    /// families get none. Patches run concurrently and are independent: one
    /// failed patch never affects the other family's outcome.
    ///
    /// An empty snapshot returns no outcomes without contacting the provider.
    ///
    /// # Errors
    ///
    /// `Error::Directory` if the record set cannot be fetched. No patch is
    /// sent in that case.
    pub async fn reconcile(&self, current: &AddressSnapshot) -> Result<Outcomes> {
        if current.is_empty() {
            debug!("Nothing resolved, skipping record lookup");
            return Ok(Outcomes::new());
        }

        let set = self.lookup_records().await?;

        let mut outcomes = Outcomes::new();
        let mut patches = Vec::new();

        for (family, ip) in current.iter() {
            match set.record(family) {
                None => {
                    warn!(
                        "No {} record named {} exists; records are not created",
                        family.record_type(),
                        self.record.fqdn()
                    );
                    outcomes.insert(family, UpdateOutcome::RecordNotFound);
                }
                Some(record) if record.points_to(ip) => {
                    debug!("{} record {} already points to {}", family.record_type(), record.id, ip);
                    outcomes.insert(family, UpdateOutcome::UpToDate);
                }
                Some(record) => {
                    patches.push(self.patch(&set.zone_id, family, record, ip));
                }
            }
        }

        for (family, outcome) in join_all(patches).await {
            outcomes.insert(family, outcome);
        }

        Ok(outcomes)
    }

    /// Patch one record, mapping the result to an outcome
    async fn patch(
        &self,
        zone_id: &str,
        family: AddressFamily,
        record: &RecordDescriptor,
        ip: IpAddr,
    ) -> (AddressFamily, UpdateOutcome) {
        let content = ip.to_string();

        match self.directory.patch_record(zone_id, &record.id, &content).await {
            Ok(()) => {
                info!(
                    "Updated {} record {}: {} -> {}",
                    family.record_type(),
                    self.record.fqdn(),
                    record.content,
                    content
                );
                (family, UpdateOutcome::Updated)
            }
            Err(e) => {
                error!(
                    "Failed to update {} record {} via {}: {}",
                    family.record_type(),
                    self.record.fqdn(),
                    self.directory.provider_name(),
                    e
                );
                (family, UpdateOutcome::Failed)
            }
        }
    }
}
