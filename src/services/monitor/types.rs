use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::services::state::StateSnapshot;

/// The latest matching notification, as seen by one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEvent {
    pub event_id: String,
    pub subject: Option<String>,
    pub url: Option<String>,
    pub source_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// No usable credential; the poller must wait for an operator.
    #[error("authentication required: {0}")]
    Auth(String),
    /// Network, quota or server trouble; retried next interval.
    #[error("{0}")]
    Transient(String),
}

/// Returns the single most recent matching event, or `None`.
#[async_trait]
pub trait FetchCapability: Send + Sync {
    async fn fetch_latest(&self) -> Result<Option<TrackedEvent>, FetchError>;
}

/// Process-local change-detection state. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollerState {
    pub last_seen_event_id: Option<String>,
    /// The snapshot most recently produced by this process.
    pub last_snapshot: Option<StateSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// A new event, or the same event with a different URL.
    Changed,
    /// Same event and URL as last cycle; only the heartbeat moves.
    Unchanged,
    /// The previously tracked event disappeared.
    Cleared,
    /// Nothing tracked before or now.
    Empty,
    AuthRequired,
    TransientError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub kind: CycleKind,
    pub snapshot: StateSnapshot,
    pub state: PollerState,
    /// The event behind a `Changed` outcome, kept for logging.
    pub event: Option<TrackedEvent>,
}
