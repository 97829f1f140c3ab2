use chrono::{DateTime, Utc};

use crate::config::TransientErrorPolicy;
use crate::services::state::StateSnapshot;

use super::types::{CycleKind, CycleOutcome, FetchCapability, FetchError, PollerState};

/// Run one fetch and decide the next snapshot.
///
/// Every branch yields exactly one snapshot; the caller persists it. Only the
/// single most recent event is ever considered.
pub async fn run_cycle(
    fetcher: &dyn FetchCapability,
    state: &PollerState,
    policy: TransientErrorPolicy,
    now: DateTime<Utc>,
) -> CycleOutcome {
    let fetched = fetcher.fetch_latest().await;
    let previous = state.last_snapshot.as_ref();

    let (kind, snapshot, last_seen_event_id, event) = match fetched {
        Err(FetchError::Auth(reason)) => (
            CycleKind::AuthRequired,
            StateSnapshot::failed(now, format!("Authentication required: {}", reason)),
            state.last_seen_event_id.clone(),
            None,
        ),
        Err(FetchError::Transient(reason)) => {
            let message = format!("Error checking emails: {}", reason);
            let snapshot = match (policy, previous) {
                (TransientErrorPolicy::Preserve, Some(previous)) => {
                    previous.with_error(now, message)
                }
                _ => StateSnapshot::failed(now, message),
            };
            (
                CycleKind::TransientError,
                snapshot,
                state.last_seen_event_id.clone(),
                None,
            )
        }
        Ok(None) => {
            let kind = if state.last_seen_event_id.is_some() {
                CycleKind::Cleared
            } else {
                CycleKind::Empty
            };
            (kind, StateSnapshot::empty(now), None, None)
        }
        Ok(Some(event)) => {
            let same_id = state.last_seen_event_id.as_deref() == Some(event.event_id.as_str());
            let persisted_url = previous.and_then(|p| p.url.as_deref());

            match previous {
                Some(previous) if same_id && event.url.as_deref() == persisted_url => (
                    CycleKind::Unchanged,
                    StateSnapshot {
                        updated_at: now,
                        error: None,
                        ..previous.clone()
                    },
                    state.last_seen_event_id.clone(),
                    None,
                ),
                _ => (
                    CycleKind::Changed,
                    StateSnapshot::tracking(now, &event),
                    Some(event.event_id.clone()),
                    Some(event),
                ),
            }
        }
    };

    CycleOutcome {
        kind,
        state: PollerState {
            last_seen_event_id,
            last_snapshot: Some(snapshot.clone()),
        },
        snapshot,
        event,
    }
}
