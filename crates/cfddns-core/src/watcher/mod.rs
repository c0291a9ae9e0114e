//! Periodic watch loop
//!
//! The watcher drives resolve-then-reconcile on a fixed interval:
//!
//! ```text
//!          ┌──────┐ start  ┌─────────┐ cycle done/failed (retry) ┌──────────┐
//!          │ Idle │ ─────▶ │ Running │ ────────────────────────▶ │ Sleeping │
//!          └──────┘        └─────────┘ ◀──────────────────────── └──────────┘
//!                               │            interval elapsed         │
//!          fatal failure or     ▼                                     │
//!          shutdown        ┌─────────┐ ◀──────── shutdown ────────────┘
//!                          │ Stopped │
//!                          └─────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Resolve the public addresses (parallel per family)
//! 2. Log an address change if the snapshot differs from the last reported one
//! 3. Reconcile against the live records, even when nothing changed locally
//! 4. On success, replace the reported snapshot; on failure keep it
//!
//! The whole cycle runs under one deadline (`WatcherConfig::cycle_timeout`)
//! and inside a `watch_cycle` span with a fresh cycle id. Failed cycles are
//! classified by the configured [`FailurePolicy`](crate::FailurePolicy):
//! `Retry` sleeps and tries again, `Terminate` stops the loop with the error.
//!
//! ## State
//!
//! The loop owns the reported snapshot and is the only writer. A copy is
//! published through [`StatusReader`] after every transition.

mod status;

pub use status::{LoopPhase, StatusReader, WatcherStatus};

use crate::config::{FailureAction, WatcherConfig};
use crate::error::{Error, Result};
use crate::model::{AddressSnapshot, Outcomes};
use crate::reconciler::Reconciler;
use crate::resolver::AddressResolver;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Explicit shutdown (signal or handle)
    Shutdown,
    /// The loop is disabled and never started
    Disabled,
    /// A failure classified as `Terminate`
    Fatal,
}

/// Events emitted by the Watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    /// Loop started
    Started {
        interval: Duration,
    },

    /// A cycle began
    CycleStarted {
        cycle_id: Uuid,
    },

    /// The resolved snapshot differs from the last reported one
    AddressChangeDetected {
        cycle_id: Uuid,
        previous: Option<AddressSnapshot>,
        current: AddressSnapshot,
    },

    /// Reconciliation finished for every resolved family
    CycleCompleted {
        cycle_id: Uuid,
        outcomes: Outcomes,
    },

    /// The cycle was aborted
    CycleFailed {
        cycle_id: Uuid,
        error: String,
        action: FailureAction,
    },

    /// Loop stopped
    Stopped {
        reason: StopReason,
    },
}

/// Watch loop
///
/// ## Lifecycle
///
/// 1. Create with [`Watcher::new()`]
/// 2. Either drive it in place with [`Watcher::run()`] /
///    [`Watcher::run_with_shutdown()`], or move it onto its own task with
///    [`Watcher::spawn()`]
/// 3. The loop runs until shutdown or a fatal failure
pub struct Watcher {
    /// Public address resolution
    resolver: AddressResolver,

    /// Compare-and-patch against the provider
    reconciler: Reconciler,

    /// Interval, deadline, failure policy
    config: WatcherConfig,

    /// Snapshot of the last successful cycle
    reported: Option<AddressSnapshot>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<WatcherEvent>,

    /// Published status
    status_tx: watch::Sender<Arc<WatcherStatus>>,
}

impl Watcher {
    /// Create a new watcher
    ///
    /// # Returns
    ///
    /// A tuple of (watcher, event_receiver) where event_receiver yields
    /// watcher events
    pub fn new(
        resolver: AddressResolver,
        reconciler: Reconciler,
        config: WatcherConfig,
    ) -> Result<(Self, mpsc::Receiver<WatcherEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let (status_tx, _) = watch::channel(Arc::new(WatcherStatus::default()));

        let watcher = Self {
            resolver,
            reconciler,
            config,
            reported: None,
            event_tx,
            status_tx,
        };

        Ok((watcher, event_rx))
    }

    /// Read access to the published status
    pub fn status(&self) -> StatusReader {
        StatusReader::new(self.status_tx.subscribe())
    }

    /// Snapshot of the last successful cycle
    pub fn reported_addresses(&self) -> Option<&AddressSnapshot> {
        self.reported.as_ref()
    }

    /// Loop configuration
    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Run the loop until SIGINT or a fatal failure
    ///
    /// # Returns
    ///
    /// - `Ok(StopReason)`: Clean shutdown, or the loop is disabled
    /// - `Err(Error)`: The failure that terminated the loop
    pub async fn run(&mut self) -> Result<StopReason> {
        self.run_with_shutdown(None).await
    }

    /// Run the loop with an explicit shutdown signal
    ///
    /// With `None` the loop waits for SIGINT instead. Dropping the sender
    /// without sending does not stop the loop.
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<StopReason> {
        match shutdown_rx {
            Some(rx) => {
                self.run_until(async move {
                    if rx.await.is_err() {
                        std::future::pending::<()>().await;
                    }
                })
                .await
            }
            None => {
                self.run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                })
                .await
            }
        }
    }

    /// Move the loop onto its own task
    ///
    /// The loop stops when the returned handle is stopped or dropped.
    pub fn spawn(mut self) -> WatcherHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let status = self.status();

        // A dropped handle drops the sender, which also ends the loop
        let join = tokio::spawn(async move {
            self.run_until(async move {
                let _ = shutdown_rx.await;
            })
            .await
        });

        WatcherHandle {
            join: Some(join),
            shutdown_tx: Some(shutdown_tx),
            status,
        }
    }

    async fn run_until<F>(&mut self, shutdown: F) -> Result<StopReason>
    where
        F: Future<Output = ()>,
    {
        if !self.config.enabled {
            warn!("Watcher disabled in configuration, not starting");
            self.publish(|status| status.phase = LoopPhase::Disabled);
            self.emit_event(WatcherEvent::Stopped {
                reason: StopReason::Disabled,
            });
            return Ok(StopReason::Disabled);
        }

        tokio::pin!(shutdown);

        info!(
            "Watcher started with interval {:?} and cycle timeout {:?}",
            self.config.interval, self.config.cycle_timeout
        );
        self.emit_event(WatcherEvent::Started {
            interval: self.config.interval,
        });

        loop {
            let cycle_id = Uuid::new_v4();
            let span = info_span!("watch_cycle", cycle_id = %cycle_id);
            let deadline = self.config.cycle_timeout;

            self.publish(|status| status.phase = LoopPhase::Running);
            self.emit_event(WatcherEvent::CycleStarted { cycle_id });

            let finished = tokio::select! {
                result = tokio::time::timeout(deadline, self.cycle(cycle_id).instrument(span.clone())) => {
                    Some(result.unwrap_or(Err(Error::CycleTimeout(deadline))))
                }
                _ = &mut shutdown => None,
            };

            let Some(result) = finished else {
                return Ok(self.stop(StopReason::Shutdown));
            };

            if let Err(e) = span.in_scope(|| self.complete_cycle(cycle_id, result)) {
                self.stop(StopReason::Fatal);
                return Err(e);
            }

            self.publish(|status| status.phase = LoopPhase::Sleeping);
            debug!("Next cycle in {:?}", self.config.interval);

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = &mut shutdown => return Ok(self.stop(StopReason::Shutdown)),
            }
        }
    }

    /// One resolve-then-reconcile pass; does not touch loop state
    async fn cycle(&self, cycle_id: Uuid) -> Result<(AddressSnapshot, Outcomes)> {
        debug!("Checking for address changes");

        let current = self.resolver.resolve().await;
        if current.is_empty() {
            warn!("No public address could be resolved");
        }

        if self.reported.as_ref() != Some(&current) {
            let summary = current.change_summary(self.reported.as_ref());
            if !summary.is_empty() {
                info!("Address change detected. {}", summary);
            }
            self.emit_event(WatcherEvent::AddressChangeDetected {
                cycle_id,
                previous: self.reported.clone(),
                current: current.clone(),
            });
        }

        let outcomes = self.reconciler.reconcile(&current).await?;
        Ok((current, outcomes))
    }

    /// Apply a cycle's result to loop state
    ///
    /// Returns the error back if the policy says to terminate.
    fn complete_cycle(
        &mut self,
        cycle_id: Uuid,
        result: Result<(AddressSnapshot, Outcomes)>,
    ) -> Result<()> {
        match result {
            Ok((snapshot, outcomes)) => {
                if !outcomes.is_empty() {
                    info!("Reconciliation finished: {}", describe(&outcomes));
                }

                self.reported = Some(snapshot.clone());
                self.publish(|status| {
                    status.reported_addresses = Some(snapshot);
                    status.last_outcomes = outcomes.clone();
                    status.last_cycle_at = Some(Utc::now());
                    status.last_error = None;
                    status.cycles_completed += 1;
                });
                self.emit_event(WatcherEvent::CycleCompleted { cycle_id, outcomes });
                Ok(())
            }
            Err(e) => {
                let action = self.config.failure_policy.classify(&e);

                self.publish(|status| {
                    status.last_cycle_at = Some(Utc::now());
                    status.last_error = Some(e.to_string());
                    status.cycles_failed += 1;
                });
                self.emit_event(WatcherEvent::CycleFailed {
                    cycle_id,
                    error: e.to_string(),
                    action,
                });

                match action {
                    FailureAction::Retry => {
                        warn!(
                            "Watch cycle failed, keeping last reported addresses and retrying in {:?}: {}",
                            self.config.interval, e
                        );
                        Ok(())
                    }
                    FailureAction::Terminate => {
                        error!("Potentially non-recoverable failure in watch cycle, terminating: {}", e);
                        Err(e)
                    }
                }
            }
        }
    }

    fn stop(&mut self, reason: StopReason) -> StopReason {
        info!("Watcher stopped ({:?})", reason);
        self.publish(|status| status.phase = LoopPhase::Stopped);
        self.emit_event(WatcherEvent::Stopped { reason });
        reason
    }

    fn publish(&self, update: impl FnOnce(&mut WatcherStatus)) {
        self.status_tx
            .send_modify(|status| update(Arc::make_mut(status)));
    }

    fn emit_event(&self, event: WatcherEvent) {
        // Never block the loop on a slow consumer
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody listens for events; that is allowed
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Handle to a watcher running on its own task
///
/// Dropping the handle shuts the loop down like [`WatcherHandle::stop`],
/// without waiting for it.
pub struct WatcherHandle {
    join: Option<JoinHandle<Result<StopReason>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    status: StatusReader,
}

impl WatcherHandle {
    /// Read access to the published status
    pub fn status(&self) -> StatusReader {
        self.status.clone()
    }

    /// Whether the loop has ended (shutdown, disabled or fatal)
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the loop to end on its own
    ///
    /// Cancel-safe: dropping this future leaves the loop running, and
    /// [`WatcherHandle::stop`] can still be called afterwards.
    pub async fn finished(&mut self) -> Result<StopReason> {
        let Some(join) = self.join.as_mut() else {
            return Err(Error::Other("Watcher task already joined".to_string()));
        };

        let joined = join.await;
        self.join = None;

        match joined {
            Ok(result) => result,
            Err(e) => Err(Error::Other(format!("Watcher task failed: {}", e))),
        }
    }

    /// Ask the loop to stop and wait for it
    ///
    /// A cycle in flight is cancelled; the reported snapshot is left as is.
    pub async fn stop(mut self) -> Result<StopReason> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Err means the loop already ended
            let _ = tx.send(());
        }
        self.finished().await
    }
}

fn describe(outcomes: &Outcomes) -> String {
    outcomes
        .iter()
        .map(|(family, outcome)| format!("{} {}", family, outcome))
        .collect::<Vec<_>>()
        .join(", ")
}
