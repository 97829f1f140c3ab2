use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::monitor::TrackedEvent;

/// The single persisted record shared between the poller and the readers.
///
/// `updated_at` is when the poller last wrote; `timestamp` is when the tracked
/// event itself happened. Readers use the former for producer health and the
/// latter for content staleness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub email_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StateSnapshot {
    /// Written once when the poller process starts, before the first cycle.
    pub fn initializing(now: DateTime<Utc>) -> Self {
        Self::failed(now, "monitor starting")
    }

    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            url: None,
            timestamp: None,
            email_id: None,
            error: None,
        }
    }

    pub fn tracking(now: DateTime<Utc>, event: &TrackedEvent) -> Self {
        Self {
            updated_at: now,
            url: event.url.clone(),
            timestamp: event.source_timestamp,
            email_id: Some(event.event_id.clone()),
            error: None,
        }
    }

    pub fn failed(now: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(now)
        }
    }

    /// Same content as `self`, re-stamped with `now` and carrying `error`.
    pub fn with_error(&self, now: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            updated_at: now,
            error: Some(error.into()),
            ..self.clone()
        }
    }

    pub fn has_activity(&self) -> bool {
        self.url.is_some()
    }
}
