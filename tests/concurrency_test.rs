//! Concurrent access to live sessions.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{TestApp, north_of_center};
use rollcall_core::ErrorKind;
use rollcall_core::types::SessionId;
use rollcall_service::dto::StartWindowRequest;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_participants_are_all_recorded() {
    let app = TestApp::new();
    let id = app.open_session(false).await;
    let submissions = Arc::new(app.services.submissions.clone());

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let submissions = submissions.clone();
            tokio::spawn(async move {
                submissions
                    .submit(id, north_of_center(&format!("S{i}"), &format!("P{i}"), i as f64))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task").expect("accepted");
    }

    let records = app.services.submissions.list_records(id).await.expect("records");
    assert_eq!(records.len(), 64);
    let session = app.registry.get(id).expect("live");
    assert!(session.is_consistent().await);

    let csv = app.services.submissions.export_audit(id).await.expect("export");
    assert_eq!(csv.lines().count(), 65);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_participant_accepted_exactly_once() {
    let app = TestApp::new();
    let id = app.open_session(false).await;
    let submissions = Arc::new(app.services.submissions.clone());

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let submissions = submissions.clone();
            tokio::spawn(async move {
                submissions
                    .submit(id, north_of_center("S1", "Ada", i as f64))
                    .await
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(_) => accepted += 1,
            Err(e) => assert_eq!(e.kind, ErrorKind::Conflict),
        }
    }
    assert_eq!(accepted, 1);

    let csv = app.services.submissions.export_audit(id).await.expect("export");
    assert_eq!(csv.lines().count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sessions_progress_independently() {
    let app = TestApp::new();
    let ids: Vec<SessionId> = {
        let mut ids = Vec::new();
        for _ in 0..8 {
            ids.push(app.open_session(false).await);
        }
        ids
    };
    let submissions = Arc::new(app.services.submissions.clone());

    let handles: Vec<_> = ids
        .iter()
        .flat_map(|id| (0..8).map(move |i| (*id, i)))
        .map(|(id, i)| {
            let submissions = submissions.clone();
            tokio::spawn(async move {
                submissions
                    .submit(id, north_of_center(&format!("S{i}"), "P", 5.0))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task").expect("accepted");
    }

    for id in ids {
        let records = app.services.submissions.list_records(id).await.expect("records");
        assert_eq!(records.len(), 8);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restart_during_submissions_keeps_ledger_consistent() {
    let app = TestApp::new();
    let id = app.open_session(false).await;
    let submissions = Arc::new(app.services.submissions.clone());
    let windows = app.services.windows.clone();

    let writers: Vec<_> = (0..32)
        .map(|i| {
            let submissions = submissions.clone();
            tokio::spawn(async move {
                let _ = submissions
                    .submit(id, north_of_center(&format!("S{i}"), "P", 1.0))
                    .await;
            })
        })
        .collect();
    let restarter = tokio::spawn(async move {
        for _ in 0..4 {
            windows
                .start_window(id, StartWindowRequest::default())
                .await
                .expect("restart");
            tokio::task::yield_now().await;
        }
    });

    for handle in writers {
        handle.await.expect("task");
    }
    restarter.await.expect("restarter");

    let session = app.registry.get(id).expect("live");
    assert!(session.is_consistent().await);
}

#[tokio::test(start_paused = true)]
async fn test_timer_closes_window_without_traffic() {
    let app = TestApp::new();
    let id = app.open_session(false).await;

    // Only tokio time moves; the session clock still reads the start time,
    // so the window can only be closed by its timer.
    tokio::time::sleep(Duration::from_secs(helpers::WINDOW_SECONDS as u64 + 1)).await;

    let status = app.services.windows.window_status(id).await.expect("status");
    assert!(!status.active);
}
