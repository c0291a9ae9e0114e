//! Read-only status published by the watch loop
//!
//! The loop is the only writer. Readers get an immutable `Arc` snapshot and
//! never block a running cycle.

use crate::model::{AddressSnapshot, Outcomes};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Where the loop currently is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    /// Created, not started yet
    #[default]
    Idle,
    /// A cycle is in flight
    Running,
    /// Waiting for the next tick
    Sleeping,
    /// Shut down or terminated after a fatal failure
    Stopped,
    /// Never started because the loop is disabled
    Disabled,
}

/// Status of the watch loop at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WatcherStatus {
    /// Current phase
    pub phase: LoopPhase,

    /// Snapshot of the last successful cycle (absent before the first one)
    pub reported_addresses: Option<AddressSnapshot>,

    /// Per-family outcomes of the last successful cycle
    pub last_outcomes: Outcomes,

    /// When the last cycle ended, successful or not
    pub last_cycle_at: Option<DateTime<Utc>>,

    /// Error of the last cycle, cleared by the next successful one
    pub last_error: Option<String>,

    /// Number of successful cycles
    pub cycles_completed: u64,

    /// Number of failed cycles
    pub cycles_failed: u64,
}

/// Cheap, cloneable read access to the latest [`WatcherStatus`]
#[derive(Debug, Clone)]
pub struct StatusReader {
    rx: watch::Receiver<Arc<WatcherStatus>>,
}

impl StatusReader {
    pub(crate) fn new(rx: watch::Receiver<Arc<WatcherStatus>>) -> Self {
        Self { rx }
    }

    /// A reader that always returns `status`
    ///
    /// For exercising status consumers without a running loop.
    pub fn fixed(status: WatcherStatus) -> Self {
        let (_tx, rx) = watch::channel(Arc::new(status));
        Self { rx }
    }

    /// Latest published status
    pub fn current(&self) -> Arc<WatcherStatus> {
        Arc::clone(&self.rx.borrow())
    }

    /// Wait until the published status satisfies `predicate`
    ///
    /// Returns `None` if the loop was dropped before that happened.
    pub async fn wait_until(
        &mut self,
        mut predicate: impl FnMut(&WatcherStatus) -> bool,
    ) -> Option<Arc<WatcherStatus>> {
        self.rx
            .wait_for(|status| predicate(status))
            .await
            .ok()
            .map(|status| Arc::clone(&status))
    }
}
