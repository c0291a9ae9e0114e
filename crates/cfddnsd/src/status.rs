//! Read-only HTTP status endpoint
//!
//! `GET /status` returns the watcher's latest published status as JSON. The
//! handler only reads the status channel, so a slow client never holds up a
//! running cycle.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use cfddns_core::{StatusReader, WatcherStatus};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Shared state of the status routes
#[derive(Clone)]
pub struct StatusState {
    pub reader: StatusReader,
    pub record: String,
    pub dry_run: bool,
}

/// Body of `GET /status`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Fully qualified name being kept in sync
    pub record: String,
    pub dry_run: bool,
    #[serde(flatten)]
    pub status: WatcherStatus,
}

pub async fn get_status(State(state): State<StatusState>) -> Json<StatusResponse> {
    let status = state.reader.current();
    Json(StatusResponse {
        record: state.record,
        dry_run: state.dry_run,
        status: WatcherStatus::clone(&status),
    })
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .with_state(state)
}

/// Bind the status listener
///
/// Kept apart from [`serve`] so a taken port fails startup instead of a
/// background task.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind status endpoint on {}", addr))?;

    tracing::info!("Status endpoint listening on http://{}/status", listener.local_addr()?);
    Ok(listener)
}

/// Serve the status routes until `shutdown` fires or its sender is dropped
pub async fn serve(listener: TcpListener, state: StatusState, shutdown: oneshot::Receiver<()>) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
        })
        .await
        .context("Status endpoint failed")
}
