//! Environment configuration for cfddnsd
//!
//! Every setting comes from a `CFDDNS_*` environment variable. Values that
//! are present but unparseable are errors, never silently defaulted.

use anyhow::{Context, Result};
use cfddns_core::{
    CloudflareConfig, DdnsConfig, FailureAction, FailurePolicy, FamilyConfig, RecordConfig,
    ResolutionConfig, WatcherConfig,
};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Core configuration handed to the watcher and its collaborators
    pub ddns: DdnsConfig,

    /// Bind address of the status endpoint; disabled when absent
    pub status_addr: Option<SocketAddr>,

    /// tracing max level
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| var(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_token = var("CFDDNS_API_TOKEN").context(
            "CFDDNS_API_TOKEN is required. Set it via: export CFDDNS_API_TOKEN=your_token",
        )?;
        let zone_name = var("CFDDNS_ZONE_NAME").context(
            "CFDDNS_ZONE_NAME is required. Set it via: export CFDDNS_ZONE_NAME=example.com",
        )?;
        let subdomain = var("CFDDNS_SUBDOMAIN").context(
            "CFDDNS_SUBDOMAIN is required (use @ for the zone apex). \
            Set it via: export CFDDNS_SUBDOMAIN=home",
        )?;

        let dry_run = match var("CFDDNS_MODE").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("live") => false,
            Some("dry-run") => true,
            Some(other) => anyhow::bail!(
                "CFDDNS_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        };

        let cloudflare = CloudflareConfig {
            api_token,
            email: var("CFDDNS_AUTH_EMAIL"),
            api_base: var("CFDDNS_API_BASE"),
            dry_run,
        };

        let defaults = WatcherConfig::default();
        let watcher = WatcherConfig {
            interval: parse_secs(&var, "CFDDNS_WATCH_INTERVAL_SECS")?.unwrap_or(defaults.interval),
            cycle_timeout: parse_secs(&var, "CFDDNS_WATCH_TIMEOUT_SECS")?
                .unwrap_or(defaults.cycle_timeout),
            enabled: parse_bool(&var, "CFDDNS_WATCH_ENABLED")?.unwrap_or(defaults.enabled),
            failure_policy: FailurePolicy {
                on_directory_failure: parse_action(&var, "CFDDNS_ON_DIRECTORY_FAILURE")?
                    .unwrap_or(defaults.failure_policy.on_directory_failure),
                on_timeout: parse_action(&var, "CFDDNS_ON_TIMEOUT")?
                    .unwrap_or(defaults.failure_policy.on_timeout),
            },
            ..defaults
        };

        let resolution = ResolutionConfig {
            timeout: parse_secs(&var, "CFDDNS_IP_TIMEOUT_SECS")?
                .unwrap_or(ResolutionConfig::default().timeout),
            contact_email: var("CFDDNS_IP_CONTACT_EMAIL"),
            ipv4: family_from_vars(&var, "IPV4")?,
            ipv6: family_from_vars(&var, "IPV6")?,
        };

        let status_addr = var("CFDDNS_STATUS_ADDR")
            .map(|addr| {
                addr.parse::<SocketAddr>()
                    .with_context(|| format!("CFDDNS_STATUS_ADDR '{}' is not a socket address", addr))
            })
            .transpose()?;

        Ok(Self {
            ddns: DdnsConfig {
                cloudflare,
                record: RecordConfig::new(zone_name, subdomain),
                resolution,
                watcher,
            },
            status_addr,
            log_level: var("CFDDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Runs the core checks, then the checks only the daemon cares about:
    /// domain name syntax, placeholder tokens and the log level.
    pub fn validate(&self) -> Result<()> {
        self.ddns.validate()?;

        let token = self.ddns.cloudflare.api_token.to_lowercase();
        if token.contains("your_token") || token.contains("replace_me") || token == "token" {
            anyhow::bail!(
                "CFDDNS_API_TOKEN appears to be a placeholder. \
                Use an actual API token from the Cloudflare dashboard."
            );
        }

        let record = &self.ddns.record;
        validate_domain_name(record.zone_name.trim_end_matches('.'))
            .context("CFDDNS_ZONE_NAME is not a valid domain name")?;
        validate_domain_name(&record.fqdn()).context("CFDDNS_SUBDOMAIN is not a valid label")?;

        if self.ddns.resolution.active_families().is_empty() {
            anyhow::bail!(
                "Both CFDDNS_IPV4_ACTIVE and CFDDNS_IPV6_ACTIVE are false; nothing to update"
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "CFDDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Settings that are valid but worth pointing out
    ///
    /// Returned rather than logged because configuration is checked before
    /// the subscriber is installed.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for url in [&self.ddns.resolution.ipv4.url, &self.ddns.resolution.ipv6.url]
            .into_iter()
            .flatten()
        {
            if url.starts_with("http://") {
                warnings.push(format!("Echo URL {} uses HTTP (not HTTPS)", url));
            }
        }

        if self.ddns.cloudflare.api_base.as_deref().is_some_and(|base| base.starts_with("http://")) {
            warnings.push("CFDDNS_API_BASE uses HTTP; the API token is sent in clear text".to_string());
        }

        warnings
    }
}

fn family_from_vars(var: &impl Fn(&str) -> Option<String>, family: &str) -> Result<FamilyConfig> {
    let defaults = FamilyConfig::default();
    Ok(FamilyConfig {
        active: parse_bool(var, &format!("CFDDNS_{}_ACTIVE", family))?.unwrap_or(defaults.active),
        warn_on_failure: parse_bool(var, &format!("CFDDNS_{}_WARN_ON_FAILURE", family))?
            .unwrap_or(defaults.warn_on_failure),
        url: var(&format!("CFDDNS_{}_URL", family)),
        timeout: parse_secs(var, &format!("CFDDNS_{}_TIMEOUT_SECS", family))?,
    })
}

fn parse_bool(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<bool>> {
    var(name)
        .map(|value| match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{} must be true or false. Got: {}", name, value),
        })
        .transpose()
}

fn parse_secs(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<Duration>> {
    var(name)
        .map(|value| {
            value
                .parse::<u64>()
                .map(Duration::from_secs)
                .with_context(|| format!("{} must be a whole number of seconds. Got: {}", name, value))
        })
        .transpose()
}

fn parse_action(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<FailureAction>> {
    var(name)
        .map(|value| {
            value
                .parse::<FailureAction>()
                .with_context(|| format!("{} is not valid", name))
        })
        .transpose()
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; catches common errors, not every one.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        // Underscore is allowed for service labels such as _acme
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}
