//! Domain types shared by the resolver, the reconciler and the watch loop

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Address family, each mapped to exactly one DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    /// IPv4, published as an A record
    IPv4,
    /// IPv6, published as an AAAA record
    IPv6,
}

impl AddressFamily {
    /// All families, in reporting order
    pub const ALL: [AddressFamily; 2] = [AddressFamily::IPv4, AddressFamily::IPv6];

    /// DNS record type carrying this family
    pub fn record_type(self) -> &'static str {
        match self {
            AddressFamily::IPv4 => "A",
            AddressFamily::IPv6 => "AAAA",
        }
    }

    /// Reverse of [`AddressFamily::record_type`]; other record types map to `None`
    pub fn from_record_type(record_type: &str) -> Option<Self> {
        match record_type {
            "A" => Some(AddressFamily::IPv4),
            "AAAA" => Some(AddressFamily::IPv6),
            _ => None,
        }
    }

    /// Family of a concrete address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::IPv4,
            IpAddr::V6(_) => AddressFamily::IPv6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::IPv4 => f.write_str("IPv4"),
            AddressFamily::IPv6 => f.write_str("IPv6"),
        }
    }
}

/// Addresses resolved in one cycle
///
/// A family is present only if it was resolved; there is no "empty" entry.
/// Backed by an ordered map, so equality does not depend on the order in
/// which entries were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressSnapshot(BTreeMap<AddressFamily, IpAddr>);

impl AddressSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this snapshot with `ip` recorded under its family
    pub fn with(mut self, ip: IpAddr) -> Self {
        self.0.insert(AddressFamily::of(&ip), ip);
        self
    }

    /// Address resolved for `family`, if any
    pub fn get(&self, family: AddressFamily) -> Option<IpAddr> {
        self.0.get(&family).copied()
    }

    /// Whether `family` was resolved
    pub fn contains(&self, family: AddressFamily) -> bool {
        self.0.contains_key(&family)
    }

    /// Number of resolved families
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was resolved
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over resolved (family, address) pairs in family order
    pub fn iter(&self) -> impl Iterator<Item = (AddressFamily, IpAddr)> + '_ {
        self.0.iter().map(|(family, ip)| (*family, *ip))
    }

    /// Human-readable per-family diff against a previous snapshot,
    /// e.g. `IPv4: 198.51.100.1 -> 203.0.113.5, IPv6: none -> 2001:db8::1`
    pub fn change_summary(&self, previous: Option<&AddressSnapshot>) -> String {
        let show = |ip: Option<IpAddr>| ip.map_or_else(|| "none".to_string(), |ip| ip.to_string());

        AddressFamily::ALL
            .iter()
            .filter(|family| self.contains(**family) || previous.is_some_and(|p| p.contains(**family)))
            .map(|family| {
                format!(
                    "{}: {} -> {}",
                    family,
                    show(previous.and_then(|p| p.get(*family))),
                    show(self.get(*family))
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<IpAddr> for AddressSnapshot {
    fn from_iter<I: IntoIterator<Item = IpAddr>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), AddressSnapshot::with)
    }
}

impl fmt::Display for AddressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (family, ip)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", family, ip)?;
        }
        f.write_str("}")
    }
}

/// Result of reconciling one family in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOutcome {
    /// The record was patched with the new address
    Updated,
    /// The record already carried the address; nothing was sent
    UpToDate,
    /// No record of the family's type exists; records are never created
    RecordNotFound,
    /// The patch request failed
    Failed,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UpdateOutcome::Updated => "updated",
            UpdateOutcome::UpToDate => "up to date",
            UpdateOutcome::RecordNotFound => "record not found",
            UpdateOutcome::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Per-family outcomes of one reconciliation
pub type Outcomes = BTreeMap<AddressFamily, UpdateOutcome>;

/// A record as the reconciler needs it: where to patch, and what it holds now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDescriptor {
    /// Provider-specific record id
    pub id: String,
    /// Current record content
    pub content: String,
}

impl RecordDescriptor {
    /// Whether the record already points at `ip`
    ///
    /// Content is compared as an address, so differently written forms of
    /// the same IPv6 address match. Content that is not an address never
    /// matches.
    pub fn points_to(&self, ip: IpAddr) -> bool {
        self.content
            .trim()
            .parse::<IpAddr>()
            .is_ok_and(|current| current == ip)
    }
}

/// Live A/AAAA records of the configured name, fetched once per cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecordSet {
    /// Zone id
    pub zone_id: String,
    /// At most one record per family
    pub records: BTreeMap<AddressFamily, RecordDescriptor>,
}

impl ZoneRecordSet {
    /// Create an empty record set for a zone
    pub fn new(zone_id: impl Into<String>) -> Self {
        Self {
            zone_id: zone_id.into(),
            records: BTreeMap::new(),
        }
    }

    /// Record for `family`, if the zone has one
    pub fn record(&self, family: AddressFamily) -> Option<&RecordDescriptor> {
        self.records.get(&family)
    }
}
