use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::state::{StateSnapshot, StoredState};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Active,
    LastActivity,
    Waiting,
}

/// Viewer-facing view of the tracked URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityStatus {
    pub url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub is_stale: bool,
    pub age_hours: Option<f64>,
    pub status: ActivityState,
}

impl ActivityStatus {
    pub fn waiting() -> Self {
        Self {
            url: None,
            timestamp: None,
            is_stale: false,
            age_hours: None,
            status: ActivityState::Waiting,
        }
    }
}

/// Classify a snapshot by the age of its source event.
///
/// Both thresholds are exclusive: an event exactly `max_age_hours` old is still
/// active, and one exactly `dead_age_hours` old is still shown as last activity.
pub fn classify(
    snapshot: &StateSnapshot,
    now: DateTime<Utc>,
    max_age_hours: f64,
    dead_age_hours: f64,
) -> ActivityStatus {
    let (url, timestamp) = match (&snapshot.url, snapshot.timestamp) {
        (Some(url), Some(timestamp)) => (url, timestamp),
        _ => return ActivityStatus::waiting(),
    };

    // Events stamped in the future (sender clock skew) count as brand new.
    let age_hours = ((now - timestamp).num_milliseconds() as f64 / MILLIS_PER_HOUR).max(0.0);

    if age_hours > dead_age_hours {
        return ActivityStatus::waiting();
    }

    let is_stale = age_hours > max_age_hours;
    ActivityStatus {
        url: Some(url.clone()),
        timestamp: Some(timestamp),
        is_stale,
        age_hours: Some(age_hours),
        status: if is_stale {
            ActivityState::LastActivity
        } else {
            ActivityState::Active
        },
    }
}

/// Whether the poller itself still appears to be running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducerHealth {
    pub state_age_seconds: Option<f64>,
    pub monitor_healthy: bool,
    pub state_file_exists: bool,
    pub has_activity: bool,
}

/// Judge producer health from `updated_at`, independent of content staleness.
/// Healthy means the last write is younger than `window` (twice the poll interval).
pub fn producer_health(
    state: &StoredState,
    now: DateTime<Utc>,
    window: Duration,
) -> ProducerHealth {
    let snapshot = state.snapshot();
    let state_age_seconds =
        snapshot.map(|s| ((now - s.updated_at).num_milliseconds() as f64 / 1000.0).max(0.0));

    ProducerHealth {
        state_age_seconds,
        monitor_healthy: state_age_seconds.is_some_and(|age| age < window.as_secs_f64()),
        state_file_exists: state.exists(),
        has_activity: snapshot.is_some_and(StateSnapshot::has_activity),
    }
}
