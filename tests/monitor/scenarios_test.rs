// =============================================================================
// INTEGRATION TESTS - POLLER SCENARIOS
// Cycle sequences through the engine, checked with the viewer classifier
// =============================================================================

use chrono::Utc;
use std::sync::Arc;

use livetrack_relay::services::classifier::{classify, ActivityState};
use livetrack_relay::services::monitor::{CycleKind, FetchError, MonitorEngine};

use crate::common::{event, test_config, RecordingSink, ScriptedFetch};

#[tokio::test]
async fn test_event_then_nothing_returns_to_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[]);
    let fetch = Arc::new(ScriptedFetch::new(vec![
        Ok(Some(event("e1", "https://x/livetrack/1"))),
        Ok(None),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch.clone(), sink.clone(), &config);

    assert_eq!(engine.tick().await, CycleKind::Changed);
    assert_eq!(engine.tick().await, CycleKind::Cleared);

    let snapshots = sink.snapshots();
    let first = classify(&snapshots[0], Utc::now(), 24.0, 48.0);
    assert_eq!(first.status, ActivityState::Active);
    assert_eq!(first.url.as_deref(), Some("https://x/livetrack/1"));

    let second = classify(&snapshots[1], Utc::now(), 24.0, 48.0);
    assert_eq!(second.status, ActivityState::Waiting);
    assert_eq!(second.url, None);
    assert_eq!(snapshots[1].email_id, None);
    assert_eq!(engine.state().last_seen_event_id, None);
}

#[tokio::test]
async fn test_unchanged_event_only_moves_heartbeat() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[]);
    let repeated = event("e1", "u1");
    let fetch = Arc::new(ScriptedFetch::new(vec![
        Ok(Some(repeated.clone())),
        Ok(Some(repeated)),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch, sink.clone(), &config);

    assert_eq!(engine.tick().await, CycleKind::Changed);
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(engine.tick().await, CycleKind::Unchanged);

    let snapshots = sink.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].url, snapshots[1].url);
    assert_eq!(snapshots[0].timestamp, snapshots[1].timestamp);
    assert_eq!(snapshots[0].email_id, snapshots[1].email_id);
    assert!(snapshots[1].updated_at > snapshots[0].updated_at);
}

#[tokio::test]
async fn test_auth_failure_then_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[]);
    let fetch = Arc::new(ScriptedFetch::new(vec![
        Err(FetchError::Auth("no stored token".into())),
        Ok(Some(event("e1", "u1"))),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch, sink.clone(), &config);

    assert_eq!(engine.tick().await, CycleKind::AuthRequired);
    assert_eq!(engine.tick().await, CycleKind::Changed);

    let snapshots = sink.snapshots();
    assert_eq!(snapshots[0].url, None);
    assert!(snapshots[0]
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("Authentication required")));
    assert_eq!(snapshots[1].url.as_deref(), Some("u1"));
    assert_eq!(snapshots[1].error, None);
}

#[tokio::test]
async fn test_transient_error_policy_preserve_keeps_url() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[("TRANSIENT_ERROR_POLICY", "preserve")]);
    let fetch = Arc::new(ScriptedFetch::new(vec![
        Ok(Some(event("e1", "u1"))),
        Err(FetchError::Transient("connection reset".into())),
        Ok(Some(event("e1", "u1"))),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch, sink.clone(), &config);

    engine.tick().await;
    assert_eq!(engine.tick().await, CycleKind::TransientError);
    assert_eq!(engine.tick().await, CycleKind::Unchanged);

    let snapshots = sink.snapshots();
    assert_eq!(snapshots[1].url.as_deref(), Some("u1"));
    assert_eq!(
        snapshots[1].error.as_deref(),
        Some("Error checking emails: connection reset")
    );
    assert_eq!(snapshots[2].error, None);
}

#[tokio::test]
async fn test_transient_error_default_policy_clears_url() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[]);
    let fetch = Arc::new(ScriptedFetch::new(vec![
        Ok(Some(event("e1", "u1"))),
        Err(FetchError::Transient("503".into())),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch, sink.clone(), &config);

    engine.tick().await;
    engine.tick().await;

    let snapshots = sink.snapshots();
    assert_eq!(snapshots[1].url, None);
    assert_eq!(snapshots[1].error.as_deref(), Some("Error checking emails: 503"));
    // Change detection still remembers the event.
    assert_eq!(engine.state().last_seen_event_id.as_deref(), Some("e1"));
}
