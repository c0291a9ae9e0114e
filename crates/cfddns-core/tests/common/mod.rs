//! Test doubles and common utilities for contract tests
//!
//! The doubles are scripted per family and count every call, so tests can
//! assert both results and the exact number of network interactions.

#![allow(dead_code)]

use async_trait::async_trait;
use cfddns_core::error::{Error, Result};
use cfddns_core::{
    AddressFamily, AddressResolver, AddressSource, DnsRecord, Reconciler, RecordConfig,
    ResolutionConfig, WatcherConfig, ZoneDirectory,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

pub const ZONE_NAME: &str = "example.com";
pub const SUBDOMAIN: &str = "home";
pub const FQDN: &str = "home.example.com";
pub const ZONE_ID: &str = "zone-1";

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid IP literal")
}

pub fn record_config() -> RecordConfig {
    RecordConfig::new(ZONE_NAME, SUBDOMAIN)
}

/// Watcher settings scaled down for tests
pub fn fast_watcher_config() -> WatcherConfig {
    WatcherConfig::default()
        .with_interval(Duration::from_millis(50))
        .with_cycle_timeout(Duration::from_millis(500))
}

/// Behaviour of one family in [`ScriptedAddressSource`]
#[derive(Debug, Clone)]
pub enum Answer {
    /// Return this address
    Address(IpAddr),
    /// Fail with a resolution error
    Fail,
    /// Sleep, then return the address
    Delayed(Duration, IpAddr),
}

/// An AddressSource whose per-family answers can be changed mid-test
pub struct ScriptedAddressSource {
    answers: Mutex<HashMap<AddressFamily, Answer>>,
    v4_calls: Arc<AtomicUsize>,
    v6_calls: Arc<AtomicUsize>,
}

impl ScriptedAddressSource {
    /// Create a source; families without an answer fail
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            v4_calls: Arc::new(AtomicUsize::new(0)),
            v6_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the answer for a family
    pub fn answer(self, family: AddressFamily, answer: Answer) -> Self {
        self.set(family, answer);
        self
    }

    /// Replace the answer for a family while the source is in use
    pub fn set(&self, family: AddressFamily, answer: Answer) {
        self.answers.lock().unwrap().insert(family, answer);
    }

    /// Number of fetches for a family
    pub fn calls(&self, family: AddressFamily) -> usize {
        match family {
            AddressFamily::IPv4 => self.v4_calls.load(Ordering::SeqCst),
            AddressFamily::IPv6 => self.v6_calls.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl AddressSource for ScriptedAddressSource {
    async fn fetch(&self, family: AddressFamily) -> Result<IpAddr> {
        match family {
            AddressFamily::IPv4 => self.v4_calls.fetch_add(1, Ordering::SeqCst),
            AddressFamily::IPv6 => self.v6_calls.fetch_add(1, Ordering::SeqCst),
        };

        let answer = self.answers.lock().unwrap().get(&family).cloned();
        match answer {
            Some(Answer::Address(ip)) => Ok(ip),
            Some(Answer::Delayed(delay, ip)) => {
                tokio::time::sleep(delay).await;
                Ok(ip)
            }
            Some(Answer::Fail) | None => Err(Error::resolution(format!("{} echo unavailable", family))),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A ZoneDirectory backed by an in-memory record list that records patches
///
/// Successful patches are applied to the stored records, so a second
/// reconciliation sees the patched content.
pub struct RecordingZoneDirectory {
    records: Mutex<Vec<DnsRecord>>,
    patches: Mutex<Vec<(String, String)>>,
    failing_records: Mutex<HashSet<String>>,
    zone_missing: AtomicBool,
    list_fails: AtomicBool,
    patch_delay: Mutex<Option<Duration>>,
    list_delay: Mutex<Option<Duration>>,
    find_zone_calls: Arc<AtomicUsize>,
    list_calls: Arc<AtomicUsize>,
    patch_calls: Arc<AtomicUsize>,
}

impl RecordingZoneDirectory {
    /// Create a directory holding `records` under [`ZONE_ID`]
    pub fn new(records: Vec<DnsRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            patches: Mutex::new(Vec::new()),
            failing_records: Mutex::new(HashSet::new()),
            zone_missing: AtomicBool::new(false),
            list_fails: AtomicBool::new(false),
            patch_delay: Mutex::new(None),
            list_delay: Mutex::new(None),
            find_zone_calls: Arc::new(AtomicUsize::new(0)),
            list_calls: Arc::new(AtomicUsize::new(0)),
            patch_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Directory with one A and one AAAA record for [`FQDN`]
    pub fn with_pair(v4_content: &str, v6_content: &str) -> Self {
        Self::new(vec![
            DnsRecord::new("rec-a", "A", FQDN, v4_content),
            DnsRecord::new("rec-aaaa", "AAAA", FQDN, v6_content),
        ])
    }

    /// Make patches of `record_id` fail
    pub fn fail_patches_for(&self, record_id: &str) {
        self.failing_records.lock().unwrap().insert(record_id.to_string());
    }

    /// Make `find_zone` report the zone as missing (or not)
    pub fn set_zone_missing(&self, missing: bool) {
        self.zone_missing.store(missing, Ordering::SeqCst);
    }

    /// Make `list_records` fail (or not)
    pub fn set_list_fails(&self, fails: bool) {
        self.list_fails.store(fails, Ordering::SeqCst);
    }

    /// Delay every patch
    pub fn set_patch_delay(&self, delay: Duration) {
        *self.patch_delay.lock().unwrap() = Some(delay);
    }

    /// Delay every listing
    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    /// Overwrite a stored record's content, as a manual edit would
    pub fn edit_record(&self, record_id: &str, content: &str) {
        for record in self.records.lock().unwrap().iter_mut() {
            if record.id == record_id {
                record.content = content.to_string();
            }
        }
    }

    /// Content currently stored for a record
    pub fn content_of(&self, record_id: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.id == record_id)
            .map(|record| record.content.clone())
    }

    /// Successful patches as (record id, content), in completion order
    pub fn patches(&self) -> Vec<(String, String)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn find_zone_calls(&self) -> usize {
        self.find_zone_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Patch attempts, including failed ones
    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ZoneDirectory for RecordingZoneDirectory {
    async fn find_zone(&self, zone_name: &str) -> Result<String> {
        self.find_zone_calls.fetch_add(1, Ordering::SeqCst);

        if self.zone_missing.load(Ordering::SeqCst) || zone_name != ZONE_NAME {
            return Err(Error::not_found(format!("Zone not found: {}", zone_name)));
        }
        Ok(ZONE_ID.to_string())
    }

    async fn list_records(&self, zone_id: &str, name: &str) -> Result<Vec<DnsRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.list_fails.load(Ordering::SeqCst) {
            return Err(Error::http("connection reset by peer"));
        }
        assert_eq!(zone_id, ZONE_ID, "records listed with the zone id from find_zone");

        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.name == name)
            .cloned()
            .collect())
    }

    async fn patch_record(&self, zone_id: &str, record_id: &str, content: &str) -> Result<()> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(zone_id, ZONE_ID, "records patched with the zone id from find_zone");

        let delay = *self.patch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_records.lock().unwrap().contains(record_id) {
            return Err(Error::http(format!("simulated network error patching {}", record_id)));
        }

        self.edit_record(record_id, content);
        self.patches
            .lock()
            .unwrap()
            .push((record_id.to_string(), content.to_string()));
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Resolver over a shared scripted source
pub fn resolver(source: &Arc<ScriptedAddressSource>, config: ResolutionConfig) -> AddressResolver {
    AddressResolver::new(source.clone(), config)
}

/// Reconciler over a shared recording directory for [`FQDN`]
pub fn reconciler(directory: &Arc<RecordingZoneDirectory>) -> Reconciler {
    Reconciler::new(directory.clone(), record_config())
}

/// One event seen by [`CapturedLogs`]
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub message: String,
    /// Enclosing spans, outermost first: (name, fields)
    pub spans: Vec<(String, BTreeMap<String, String>)>,
}

impl CapturedEvent {
    /// Field of the innermost span called `name`
    pub fn span_field(&self, name: &str, field: &str) -> Option<&str> {
        self.spans
            .iter()
            .rev()
            .find(|(span, _)| span == name)
            .and_then(|(_, fields)| fields.get(field))
            .map(String::as_str)
    }
}

#[derive(Default)]
struct Fields(BTreeMap<String, String>);

impl Visit for Fields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

/// Layer that records every event with its span fields
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<CapturedEvent>>>);

impl CapturedLogs {
    /// Install on the current thread until the guard is dropped
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().unwrap().clone()
    }

    /// Events whose message contains `needle`
    pub fn matching(&self, needle: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.message.contains(needle))
            .collect()
    }
}

impl<S> Layer<S> for CapturedLogs
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        attrs.record(&mut fields);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);

        let spans = ctx
            .event_scope(event)
            .map(|scope| {
                scope
                    .from_root()
                    .map(|span| {
                        let fields = span
                            .extensions()
                            .get::<Fields>()
                            .map(|f| f.0.clone())
                            .unwrap_or_default();
                        (span.name().to_string(), fields)
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.0.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: fields.0.remove("message").unwrap_or_default(),
            spans,
        });
    }
}
