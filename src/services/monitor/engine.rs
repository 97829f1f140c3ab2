use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, TransientErrorPolicy};
use crate::services::credentials::CredentialManager;
use crate::services::reload::ReloadListener;
use crate::services::state::{SnapshotSink, StateSnapshot};

use super::cycle::run_cycle;
use super::types::{CycleKind, CycleOutcome, FetchCapability, PollerState};

enum Wake {
    Cancelled,
    Timer,
    Reload(io::Result<()>),
}

/// The poller: one strictly sequential fetch → persist → wait loop.
pub struct MonitorEngine {
    fetcher: Arc<dyn FetchCapability>,
    sink: Arc<dyn SnapshotSink>,
    credentials: Option<Arc<CredentialManager>>,
    reload: Option<ReloadListener>,
    poll_interval: Duration,
    auth_retry_interval: Duration,
    policy: TransientErrorPolicy,
    state: PollerState,
}

impl MonitorEngine {
    pub fn new(
        fetcher: Arc<dyn FetchCapability>,
        sink: Arc<dyn SnapshotSink>,
        config: &Config,
    ) -> Self {
        Self {
            fetcher,
            sink,
            credentials: None,
            reload: None,
            poll_interval: config.poll_interval,
            auth_retry_interval: config.auth_retry_interval,
            policy: config.transient_error_policy,
            state: PollerState::default(),
        }
    }

    /// Told about reload requests so it can move to `ReauthenticationPending`.
    pub fn with_credentials(mut self, credentials: Arc<CredentialManager>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_reload(mut self, listener: ReloadListener) -> Self {
        self.reload = Some(listener);
        self
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    /// Persist the "not yet initialized" record.
    pub fn write_initial(&self) {
        if let Err(e) = self.sink.write(&StateSnapshot::initializing(Utc::now())) {
            tracing::error!("✗ Error saving initial state: {}", e);
        }
    }

    /// Run one cycle and persist its snapshot. Never fails: errors become
    /// snapshot content or log lines.
    pub async fn tick(&mut self) -> CycleKind {
        tracing::debug!("Checking for emails...");
        let outcome = run_cycle(&*self.fetcher, &self.state, self.policy, Utc::now()).await;
        log_outcome(&outcome);

        match self.sink.write(&outcome.snapshot) {
            Ok(()) => tracing::debug!(
                "State updated: {}",
                outcome.snapshot.url.as_deref().unwrap_or("No activity")
            ),
            Err(e) => tracing::error!("✗ Error saving state: {}", e),
        }

        let kind = outcome.kind;
        self.state = outcome.state;
        kind
    }

    /// Loop until `cancel` fires. Cancellation is honoured after a cycle and
    /// during the wait, never in the middle of a fetch.
    pub async fn run(&mut self, cancel: CancellationToken) {
        tracing::info!(
            "Starting email monitoring (check interval: {}s, auth retry: {}s)",
            self.poll_interval.as_secs(),
            self.auth_retry_interval.as_secs()
        );

        loop {
            let kind = self.tick().await;
            if cancel.is_cancelled() {
                break;
            }

            let wait = if kind == CycleKind::AuthRequired {
                self.auth_retry_interval
            } else {
                self.poll_interval
            };

            let wake = tokio::select! {
                _ = cancel.cancelled() => Wake::Cancelled,
                _ = tokio::time::sleep(wait) => Wake::Timer,
                result = wait_for_reload(self.reload.as_ref()) => Wake::Reload(result),
            };

            match wake {
                Wake::Cancelled => break,
                Wake::Timer => {}
                Wake::Reload(Ok(())) => {
                    tracing::info!("⟳ Reload requested, re-checking credentials now");
                    if let Some(credentials) = &self.credentials {
                        credentials.mark_reauthentication_pending();
                    }
                }
                Wake::Reload(Err(e)) => {
                    tracing::warn!("Reload channel failed, continuing without it: {}", e);
                    self.reload = None;
                }
            }
        }

        tracing::info!("Monitoring stopped");
    }
}

async fn wait_for_reload(listener: Option<&ReloadListener>) -> io::Result<()> {
    match listener {
        Some(listener) => listener.recv().await,
        None => std::future::pending().await,
    }
}

fn log_outcome(outcome: &CycleOutcome) {
    match outcome.kind {
        CycleKind::Changed => {
            if let Some(event) = &outcome.event {
                tracing::info!(
                    "📧 New LiveTrack email detected: id={}, subject={:?}, url={:?}, time={:?}",
                    event.event_id,
                    event.subject,
                    event.url,
                    event.source_timestamp
                );
            }
        }
        CycleKind::Unchanged => tracing::debug!(
            "Email unchanged (ID: {})",
            outcome.state.last_seen_event_id.as_deref().unwrap_or_default()
        ),
        CycleKind::Cleared => tracing::info!("No LiveTrack email found, clearing previous state"),
        CycleKind::Empty => tracing::debug!("No LiveTrack emails found"),
        CycleKind::AuthRequired => tracing::warn!(
            "⚠ {}",
            outcome.snapshot.error.as_deref().unwrap_or("Authentication required")
        ),
        CycleKind::TransientError => tracing::error!(
            "✗ {}",
            outcome.snapshot.error.as_deref().unwrap_or("Error checking emails")
        ),
    }
}
