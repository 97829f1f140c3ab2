// =============================================================================
// INTEGRATION TESTS - POLLER LOOP
// One write per cycle, persistence failures, cancellation and reload wakeups
// =============================================================================

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use livetrack_relay::services::credentials::AuthState;
use livetrack_relay::services::monitor::{FetchError, MonitorEngine};
use livetrack_relay::services::reload::{request_reload, ReloadListener};
use livetrack_relay::services::state::{StateStore, StoredState};
use livetrack_relay::services::credentials::TokenStore;

use crate::common::{
    event, manager, material, test_config, FakeTokenEndpoint, RecordingSink, ScriptedFetch,
};

#[tokio::test]
async fn test_exactly_one_write_per_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[]);
    let script = vec![
        Ok(Some(event("e1", "u1"))),
        Err(FetchError::Transient("timeout".into())),
        Ok(Some(event("e1", "u1"))),
        Err(FetchError::Auth("revoked".into())),
        Ok(None),
        Ok(None),
        Ok(Some(event("e2", "u2"))),
        Ok(Some(event("e2", "u3"))),
    ];
    let cycles = script.len();
    let fetch = Arc::new(ScriptedFetch::new(script));
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch.clone(), sink.clone(), &config);

    for _ in 0..cycles {
        engine.tick().await;
    }

    assert_eq!(fetch.calls(), cycles);
    assert_eq!(sink.attempts(), cycles);
    assert_eq!(sink.snapshots().len(), cycles);
    assert_eq!(sink.snapshots()[7].url.as_deref(), Some("u3"));
}

#[tokio::test]
async fn test_failed_write_does_not_stop_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[]);
    let fetch = Arc::new(ScriptedFetch::new(vec![
        Ok(Some(event("e1", "u1"))),
        Ok(Some(event("e1", "u1"))),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch, sink.clone(), &config);

    sink.set_failing(true);
    engine.tick().await;
    sink.set_failing(false);
    engine.tick().await;

    assert_eq!(sink.attempts(), 2);
    let written = sink.snapshots();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].url.as_deref(), Some("u1"));
}

#[tokio::test]
async fn test_initial_snapshot_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[]);
    let store = Arc::new(StateStore::new(config.state_file.clone()));
    let engine = MonitorEngine::new(Arc::new(ScriptedFetch::default()), store.clone(), &config);

    engine.write_initial();

    match store.read() {
        StoredState::Present(snapshot) => {
            assert_eq!(snapshot.url, None);
            assert_eq!(snapshot.error.as_deref(), Some("monitor starting"));
        }
        other => panic!("expected a snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_ends_the_wait() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[("EMAIL_CHECK_INTERVAL", "3600")]);
    let fetch = Arc::new(ScriptedFetch::default());
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch.clone(), sink.clone(), &config);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { engine.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop should stop promptly")
        .unwrap();

    assert_eq!(fetch.calls(), 1);
    assert_eq!(sink.attempts(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_runs_one_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[]);
    let fetch = Arc::new(ScriptedFetch::default());
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch.clone(), sink.clone(), &config);

    let cancel = CancellationToken::new();
    cancel.cancel();
    engine.run(cancel).await;

    assert_eq!(fetch.calls(), 1);
    assert_eq!(sink.snapshots().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_rechecks_after_the_short_interval() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(
        dir.path(),
        &[("EMAIL_CHECK_INTERVAL", "3600"), ("AUTH_RETRY_INTERVAL", "5")],
    );
    let fetch = Arc::new(ScriptedFetch::new(vec![
        Err(FetchError::Auth("no stored token".into())),
        Ok(None),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch.clone(), sink.clone(), &config);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { engine.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(fetch.calls(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(fetch.calls(), 2);

    // Back on the regular interval once the auth failure is gone.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(fetch.calls(), 2);

    cancel.cancel();
    handle.await.unwrap();
    assert_eq!(sink.snapshots().len(), 2);
    assert!(sink.snapshots()[0].error.is_some());
}

#[tokio::test]
async fn test_reload_cuts_the_wait_short() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &[("EMAIL_CHECK_INTERVAL", "3600")]);

    TokenStore::new(config.token_file.clone())
        .save(&material("at", Some("rt"), Utc::now() + ChronoDuration::hours(1)))
        .unwrap();
    let credentials = Arc::new(manager(
        &config.token_file,
        Arc::new(FakeTokenEndpoint::new()),
        None,
    ));
    credentials.get_valid_credential().await.unwrap();
    assert_eq!(credentials.state(), AuthState::Authenticated);

    let listener = ReloadListener::bind(&config.reload_socket).unwrap();
    let fetch = Arc::new(ScriptedFetch::default());
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(fetch.clone(), sink, &config)
        .with_credentials(credentials.clone())
        .with_reload(listener);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { engine.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fetch.calls(), 1);
    assert!(request_reload(&config.reload_socket).await.unwrap());

    tokio::time::timeout(Duration::from_secs(2), async {
        while fetch.calls() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("reload should trigger an immediate cycle");
    assert_eq!(credentials.state(), AuthState::ReauthenticationPending);

    cancel.cancel();
    handle.await.unwrap();
    assert!(!config.reload_socket.exists());
}
