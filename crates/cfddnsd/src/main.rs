// # cfddnsd - Cloudflare DDNS Daemon
//
// Thin integration layer over cfddns-core. The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the HTTP echo source and the Cloudflare client into the watcher
// 4. Serving the optional status endpoint
// 5. Translating signals and watcher termination into exit codes
//
// All reconciliation logic lives in cfddns-core.
//
// ## Configuration
//
// ### Cloudflare
// - `CFDDNS_API_TOKEN`: API token (or global API key with `CFDDNS_AUTH_EMAIL`)
// - `CFDDNS_AUTH_EMAIL`: Account e-mail, switches to global-key authentication
// - `CFDDNS_API_BASE`: API base URL override
// - `CFDDNS_MODE`: `live` (default) or `dry-run`
//
// ### Record
// - `CFDDNS_ZONE_NAME`: Zone, e.g. `example.com`
// - `CFDDNS_SUBDOMAIN`: Label inside the zone, `@` for the apex
//
// ### Watch loop
// - `CFDDNS_WATCH_ENABLED`: Start the loop at all (default true)
// - `CFDDNS_WATCH_INTERVAL_SECS`: Pause between cycles (default 300)
// - `CFDDNS_WATCH_TIMEOUT_SECS`: Deadline of one cycle (default 30)
// - `CFDDNS_ON_DIRECTORY_FAILURE`, `CFDDNS_ON_TIMEOUT`: `retry` (default) or `terminate`
//
// ### Address resolution
// - `CFDDNS_IP_TIMEOUT_SECS`: Echo request timeout (default 3)
// - `CFDDNS_IP_CONTACT_EMAIL`: Contact address sent in the User-Agent
// - `CFDDNS_IPV4_ACTIVE`, `CFDDNS_IPV4_WARN_ON_FAILURE`, `CFDDNS_IPV4_URL`,
//   `CFDDNS_IPV4_TIMEOUT_SECS`, and the same for `IPV6`
//
// ### Daemon
// - `CFDDNS_STATUS_ADDR`: Bind address of `GET /status`, e.g. `127.0.0.1:8080`
// - `CFDDNS_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export CFDDNS_API_TOKEN=...
// export CFDDNS_ZONE_NAME=example.com
// export CFDDNS_SUBDOMAIN=home
// export CFDDNS_WATCH_INTERVAL_SECS=120
//
// cfddnsd
// ```

mod config;
mod status;

use anyhow::Result;
use cfddns_core::{AddressResolver, Reconciler, StopReason, Watcher};
use cfddns_ip_http::HttpAddressSource;
use cfddns_provider_cloudflare::CloudflareClient;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use crate::config::Config;
use crate::status::StatusState;

/// Upper bound for stopping the watcher and the status endpoint
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error, including a watcher terminated by its failure policy
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting cfddnsd {}", env!("CARGO_PKG_VERSION"));
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// What ended the main wait
enum Ended {
    Signal(&'static str),
    Watcher(cfddns_core::Result<StopReason>),
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let ddns = config.ddns;

    let source = Arc::new(HttpAddressSource::new(&ddns.resolution)?);
    let client = Arc::new(CloudflareClient::new(&ddns.cloudflare)?);

    let resolver = AddressResolver::new(source.clone(), ddns.resolution.clone());
    for family in resolver.config().active_families() {
        info!("Resolving {} via {}", family, source.url(family));
    }

    let reconciler = Reconciler::new(client, ddns.record.clone());
    let record = reconciler.record().fqdn();

    let (watcher, mut events) = Watcher::new(resolver, reconciler, ddns.watcher.clone())?;
    info!(
        "Managing {} (interval {:?}, cycle timeout {:?})",
        record,
        watcher.config().interval,
        watcher.config().cycle_timeout
    );

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Watcher event");
        }
    });

    // Bind before starting the loop so a taken port fails startup
    let listener = match config.status_addr {
        Some(addr) => Some(status::bind(addr).await?),
        None => None,
    };

    let mut handle = watcher.spawn();

    let (status_shutdown_tx, status_shutdown_rx) = oneshot::channel();
    let status_server = listener.map(|listener| {
        let state = StatusState {
            reader: handle.status(),
            record,
            dry_run: ddns.cloudflare.dry_run,
        };
        tokio::spawn(status::serve(listener, state, status_shutdown_rx))
    });

    let ended = tokio::select! {
        signal = wait_for_shutdown() => Ended::Signal(signal?),
        finished = handle.finished() => Ended::Watcher(finished),
    };

    let result = match ended {
        Ended::Signal(signal) => {
            info!("Received shutdown signal: {}", signal);
            stop_watcher(handle).await
        }
        Ended::Watcher(Ok(StopReason::Disabled)) => {
            info!("Watch loop disabled; waiting for shutdown signal");
            let signal = wait_for_shutdown().await?;
            info!("Received shutdown signal: {}", signal);
            Ok(())
        }
        Ended::Watcher(Ok(reason)) => {
            info!("Watch loop ended: {:?}", reason);
            Ok(())
        }
        Ended::Watcher(Err(e)) => Err(anyhow::anyhow!("Watch loop terminated: {}", e)),
    };

    if let Some(server) = status_server {
        // Err means the server already ended
        let _ = status_shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, server).await {
            Ok(Ok(Ok(()))) => debug!("Status endpoint stopped"),
            Ok(Ok(Err(e))) => warn!("Status endpoint error: {:#}", e),
            Ok(Err(e)) => warn!("Status endpoint task failed: {}", e),
            Err(_) => warn!("Status endpoint did not stop within {:?}", SHUTDOWN_TIMEOUT),
        }
    }

    info!("Shutting down daemon");
    result
}

/// Stop the watcher, cancelling a cycle in flight
async fn stop_watcher(handle: cfddns_core::WatcherHandle) -> Result<()> {
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.stop()).await {
        Ok(Ok(reason)) => {
            info!("Watch loop stopped: {:?}", reason);
            Ok(())
        }
        Ok(Err(e)) => Err(anyhow::anyhow!("Watch loop failed while stopping: {}", e)),
        Err(_) => anyhow::bail!("Watch loop did not stop within {:?}", SHUTDOWN_TIMEOUT),
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
