//! Configuration types for cfddns
//!
//! This module defines all configuration structures used throughout the crate.
//! Defaults match the documented contract: a five minute interval, a thirty
//! second cycle deadline, both families active with warnings on failure and a
//! three second echo timeout.

use crate::model::AddressFamily;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main cfddns configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Cloudflare API settings
    pub cloudflare: CloudflareConfig,

    /// The record pair to keep in sync
    pub record: RecordConfig,

    /// Public address resolution
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Watch loop settings
    #[serde(default)]
    pub watcher: WatcherConfig,
}

impl DdnsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.cloudflare.validate()?;
        self.record.validate()?;
        self.resolution.validate()?;
        self.watcher.validate()?;
        Ok(())
    }
}

/// Cloudflare API configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CloudflareConfig {
    /// API token, or the global API key when `email` is set
    pub api_token: String,

    /// Account e-mail; switches authentication to `X-Auth-Email`/`X-Auth-Key`
    #[serde(default)]
    pub email: Option<String>,

    /// API base URL override (defaults to the public v4 endpoint)
    #[serde(default)]
    pub api_base: Option<String>,

    /// Perform lookups but only log patches
    #[serde(default)]
    pub dry_run: bool,
}

// The token must never end up in logs
impl std::fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("api_token", &"<REDACTED>")
            .field("email", &self.email)
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareConfig {
    /// Create a configuration authenticating with an API token
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            ..Self::default()
        }
    }

    /// Use legacy global-key authentication for this account e-mail
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Point the client at a different API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Validate the Cloudflare configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_token.is_empty() {
            return Err(crate::Error::config("Cloudflare API token cannot be empty"));
        }
        if self.email.as_deref().is_some_and(str::is_empty) {
            return Err(crate::Error::config("Cloudflare account e-mail cannot be empty when set"));
        }
        if let Some(base) = &self.api_base {
            if !is_http_url(base) {
                return Err(crate::Error::config(format!(
                    "Cloudflare API base must be an HTTP(S) URL, got: {}",
                    base
                )));
            }
        }
        Ok(())
    }
}

/// The name whose A/AAAA records are managed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Zone name as registered with the provider (e.g. "example.com")
    pub zone_name: String,

    /// Label inside the zone (e.g. "home"), or "@" for the zone apex
    pub subdomain: String,
}

impl RecordConfig {
    /// Create a record configuration
    pub fn new(zone_name: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            zone_name: zone_name.into(),
            subdomain: subdomain.into(),
        }
    }

    /// Fully qualified record name
    ///
    /// A subdomain that already ends with the zone name is taken as-is.
    pub fn fqdn(&self) -> String {
        let zone = self.zone_name.trim_end_matches('.');
        let sub = self.subdomain.trim_end_matches('.');

        if sub.is_empty() || sub == "@" || sub == zone {
            zone.to_string()
        } else if sub.ends_with(&format!(".{}", zone)) {
            sub.to_string()
        } else {
            format!("{}.{}", sub, zone)
        }
    }

    /// Validate the record configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone_name.trim_end_matches('.').is_empty() {
            return Err(crate::Error::config("Zone name cannot be empty"));
        }
        if !self.zone_name.contains('.') {
            return Err(crate::Error::config(format!(
                "Zone name must contain at least one dot: {}",
                self.zone_name
            )));
        }
        if self.fqdn().len() > 253 {
            return Err(crate::Error::config(format!(
                "Record name too long: {} chars (max 253)",
                self.fqdn().len()
            )));
        }
        Ok(())
    }
}

/// Per-family resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyConfig {
    /// Whether the family is resolved (and therefore reconciled) at all
    #[serde(default = "default_true")]
    pub active: bool,

    /// Log failed resolutions at WARN instead of DEBUG
    #[serde(default = "default_true")]
    pub warn_on_failure: bool,

    /// Echo service URL override
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout override
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl Default for FamilyConfig {
    fn default() -> Self {
        Self {
            active: true,
            warn_on_failure: true,
            url: None,
            timeout: None,
        }
    }
}

impl FamilyConfig {
    /// Enable or disable the family
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Choose the log level for failed resolutions
    pub fn with_warn_on_failure(mut self, warn_on_failure: bool) -> Self {
        self.warn_on_failure = warn_on_failure;
        self
    }

    /// Override the echo service URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Public address resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Default timeout of a single echo request
    #[serde(default = "default_resolution_timeout")]
    pub timeout: Duration,

    /// Contact e-mail sent to echo services in the User-Agent
    #[serde(default)]
    pub contact_email: Option<String>,

    /// IPv4 settings
    #[serde(default)]
    pub ipv4: FamilyConfig,

    /// IPv6 settings
    #[serde(default)]
    pub ipv6: FamilyConfig,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            timeout: default_resolution_timeout(),
            contact_email: None,
            ipv4: FamilyConfig::default(),
            ipv6: FamilyConfig::default(),
        }
    }
}

impl ResolutionConfig {
    /// Settings for `family`
    pub fn family(&self, family: AddressFamily) -> &FamilyConfig {
        match family {
            AddressFamily::IPv4 => &self.ipv4,
            AddressFamily::IPv6 => &self.ipv6,
        }
    }

    /// Effective request timeout for `family`
    pub fn timeout_for(&self, family: AddressFamily) -> Duration {
        self.family(family).timeout.unwrap_or(self.timeout)
    }

    /// Families that will be resolved
    pub fn active_families(&self) -> Vec<AddressFamily> {
        AddressFamily::ALL
            .into_iter()
            .filter(|family| self.family(*family).active)
            .collect()
    }

    /// Replace the IPv4 settings
    pub fn with_ipv4(mut self, ipv4: FamilyConfig) -> Self {
        self.ipv4 = ipv4;
        self
    }

    /// Replace the IPv6 settings
    pub fn with_ipv6(mut self, ipv6: FamilyConfig) -> Self {
        self.ipv6 = ipv6;
        self
    }

    /// Set the default request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the resolution configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        for family in AddressFamily::ALL {
            if self.timeout_for(family).is_zero() {
                return Err(crate::Error::config(format!(
                    "{} resolution timeout must be > 0",
                    family
                )));
            }
            if let Some(url) = &self.family(family).url {
                if !is_http_url(url) {
                    return Err(crate::Error::config(format!(
                        "{} echo URL must use HTTP or HTTPS scheme, got: {}",
                        family, url
                    )));
                }
            }
        }
        Ok(())
    }
}

/// What the watch loop does after a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureAction {
    /// Log, keep the last snapshot and try again after the interval
    Retry,
    /// Stop the loop so the process exits and its supervisor restarts it
    Terminate,
}

impl std::str::FromStr for FailureAction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "retry" | "transient" => Ok(FailureAction::Retry),
            "terminate" | "fatal" => Ok(FailureAction::Terminate),
            other => Err(crate::Error::config(format!(
                "Unknown failure action '{}'. Valid: retry, terminate",
                other
            ))),
        }
    }
}

/// Classification of cycle failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// Action when the zone record set cannot be fetched
    #[serde(default = "default_failure_action")]
    pub on_directory_failure: FailureAction,

    /// Action when a cycle exceeds its deadline
    #[serde(default = "default_failure_action")]
    pub on_timeout: FailureAction,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            on_directory_failure: default_failure_action(),
            on_timeout: default_failure_action(),
        }
    }
}

impl FailurePolicy {
    /// Treat every cycle failure the same way
    pub fn uniform(action: FailureAction) -> Self {
        Self {
            on_directory_failure: action,
            on_timeout: action,
        }
    }

    /// Action for a cycle-aborting error
    pub fn classify(&self, error: &crate::Error) -> FailureAction {
        if error.is_timeout() {
            self.on_timeout
        } else {
            self.on_directory_failure
        }
    }
}

/// Watch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Pause between the end of one cycle and the start of the next
    #[serde(default = "default_interval")]
    pub interval: Duration,

    /// Deadline for a whole cycle (resolve and reconcile)
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout: Duration,

    /// Whether the loop starts at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Failure classification
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Capacity of the watcher event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            cycle_timeout: default_cycle_timeout(),
            enabled: true,
            failure_policy: FailurePolicy::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl WatcherConfig {
    /// Set the interval between cycles
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the per-cycle deadline
    pub fn with_cycle_timeout(mut self, cycle_timeout: Duration) -> Self {
        self.cycle_timeout = cycle_timeout;
        self
    }

    /// Enable or disable the loop
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the failure classification
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Validate the watcher configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval.is_zero() {
            return Err(crate::Error::config("Watch interval must be > 0"));
        }
        if self.cycle_timeout.is_zero() {
            return Err(crate::Error::config("Watch cycle timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn default_true() -> bool {
    true
}

fn default_resolution_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_cycle_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_failure_action() -> FailureAction {
    FailureAction::Retry
}

fn default_event_channel_capacity() -> usize {
    64
}
