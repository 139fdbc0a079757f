//! End-to-end attendance flows over the in-memory store.

mod helpers;

use std::sync::Arc;

use chrono::Duration;

use helpers::{TestApp, WINDOW_SECONDS, north_of_center};
use rollcall_core::ErrorKind;
use rollcall_core::config::session::MembershipFailurePolicy;
use rollcall_core::traits::AttendanceStore;
use rollcall_core::types::{
    AttendanceStatus, NewParticipant, ParticipantId, ScopeMode, SessionStatus,
};
use rollcall_service::dto::StartWindowRequest;

#[tokio::test]
async fn test_present_duplicate_absent_scenario() {
    let app = TestApp::new();
    let id = app.open_session(false).await;
    let submissions = &app.services.submissions;

    let ada = submissions
        .submit(id, north_of_center("S1", "Ada", 40.0))
        .await
        .expect("ada");
    assert_eq!(ada.status, AttendanceStatus::Present);
    assert_eq!(ada.distance_meters, 40);

    let err = submissions
        .submit(id, north_of_center("S1", "Ada", 5.0))
        .await
        .expect_err("resubmit");
    assert_eq!(err.kind, ErrorKind::Conflict);

    let bob = submissions
        .submit(id, north_of_center("S2", "Bob", 80.0))
        .await
        .expect("bob");
    assert_eq!(bob.status, AttendanceStatus::Absent);
    assert_eq!(bob.distance_meters, 80);

    // The first record is unchanged by the rejected resubmission.
    let records = submissions.list_records(id).await.expect("records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].distance_meters.round() as i64, 40);
    assert_eq!(records[0].status, AttendanceStatus::Present);

    let csv = submissions.export_audit(id).await.expect("export");
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("Ada,") && rows[0].ends_with(",40"));
    assert!(rows[1].starts_with("Bob,") && rows[1].ends_with(",80"));
}

#[tokio::test]
async fn test_threshold_boundary_is_present() {
    let app = TestApp::new();
    let id = app.open_session(false).await;

    let edge = app
        .services
        .submissions
        .submit(id, north_of_center("S1", "Ada", 49.99))
        .await
        .expect("edge");
    assert_eq!(edge.status, AttendanceStatus::Present);

    let beyond = app
        .services
        .submissions
        .submit(id, north_of_center("S2", "Bob", 50.01))
        .await
        .expect("beyond");
    assert_eq!(beyond.status, AttendanceStatus::Absent);
}

#[tokio::test]
async fn test_status_after_window_duration() {
    let app = TestApp::new();
    let id = app.open_session(false).await;

    app.clock.advance(Duration::seconds(WINDOW_SECONDS + 1));
    let status = app.services.windows.window_status(id).await.expect("status");
    assert!(!status.active);
    assert_eq!(status.remaining_seconds, 0);

    let err = app
        .services
        .submissions
        .submit(id, north_of_center("S1", "Ada", 1.0))
        .await
        .expect_err("closed");
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_window_start_resets_records() {
    let app = TestApp::new();
    let id = app.open_session(false).await;
    app.services
        .submissions
        .submit(id, north_of_center("S1", "Ada", 10.0))
        .await
        .expect("submit");

    app.services
        .windows
        .start_window(id, StartWindowRequest::default())
        .await
        .expect("restart");
    assert!(app.services.submissions.list_records(id).await.expect("records").is_empty());
    app.services
        .submissions
        .submit(id, north_of_center("S1", "Ada", 10.0))
        .await
        .expect("new window accepts again");

    // Both windows append to the same audit file.
    let csv = app.services.submissions.export_audit(id).await.expect("export");
    assert_eq!(csv.lines().count(), 3);
}

#[tokio::test]
async fn test_members_only_window() {
    let app = TestApp::new();
    let id = app.open_session(true).await;
    let member = app
        .services
        .directory
        .register(rollcall_service::dto::RegisterParticipantRequest {
            participant_id: "S1".into(),
            name: "Ada".into(),
        })
        .await
        .expect("register");
    app.services
        .admin
        .add_members(
            id,
            rollcall_service::dto::AddMembersRequest {
                participant_ids: vec![member.external_id.to_string()],
            },
        )
        .await
        .expect("add members");

    assert!(
        app.services
            .submissions
            .submit(id, north_of_center("S1", "Ada", 1.0))
            .await
            .is_ok()
    );
    let err = app
        .services
        .submissions
        .submit(id, north_of_center("S2", "Bob", 1.0))
        .await
        .expect_err("non-member");
    assert_eq!(err.kind, ErrorKind::Forbidden);
    assert_eq!(
        err.message,
        "You are not a member of this group. Attendance is restricted to group members only."
    );
}

#[tokio::test]
async fn test_accepted_state_reaches_store() {
    let mut app = TestApp::new();
    let id = app.open_session(false).await;
    app.store
        .create_participant(NewParticipant {
            external_id: ParticipantId::new("S1"),
            name: "Ada".into(),
        })
        .await
        .expect("participant");
    app.services
        .submissions
        .submit(id, north_of_center("S1", "Ada", 12.0))
        .await
        .expect("submit");
    app.sync().await;

    let stored = app.store.fetch_session(id).await.expect("fetch").expect("row");
    assert_eq!(stored.status, SessionStatus::Active);
    assert_eq!(stored.center_lat, Some(1.0));
    assert_eq!(stored.threshold_meters, Some(50.0));
    assert!(stored.window_end.is_some());

    let rows = app.store.list_attendance(id).await.expect("attendance");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].participant.name, "Ada");

    app.services.windows.close_window(id).await.expect("close");
    app.sync().await;
    let stored = app.store.fetch_session(id).await.expect("fetch").expect("row");
    assert_eq!(stored.status, SessionStatus::Closed);
}

#[tokio::test]
async fn test_store_outage_does_not_undo_acceptance() {
    let mut app = TestApp::new();
    let id = app.open_session(false).await;
    app.sync().await;
    app.store.set_unavailable(true);

    let receipt = app
        .services
        .submissions
        .submit(id, north_of_center("S1", "Ada", 3.0))
        .await
        .expect("accepted while store is down");
    assert_eq!(receipt.status, AttendanceStatus::Present);
    app.sync().await;

    let records = app.services.submissions.list_records(id).await.expect("records");
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_restart_restores_open_window_and_blocks_resubmission() {
    let mut first = TestApp::new();
    let id = first.open_session(false).await;
    first
        .store
        .create_participant(NewParticipant {
            external_id: ParticipantId::new("S1"),
            name: "Ada".into(),
        })
        .await
        .expect("participant");
    first
        .services
        .submissions
        .submit(id, north_of_center("S1", "Ada", 20.0))
        .await
        .expect("submit");
    first.sync().await;
    first.registry.close_all().await;

    let second = TestApp::with_store(Arc::clone(&first.store), MembershipFailurePolicy::Deny);
    second.clock.advance(Duration::seconds(60));

    let status = second.services.windows.window_status(id).await.expect("status");
    assert!(status.active);
    assert_eq!(status.name, "Field Lab");
    assert_eq!(status.remaining_seconds, (WINDOW_SECONDS - 60) as u64);

    let err = second
        .services
        .submissions
        .submit(id, north_of_center("S1", "Ada", 20.0))
        .await
        .expect_err("already submitted before restart");
    assert_eq!(err.kind, ErrorKind::Conflict);

    let info = second.services.admin.center_info(id).await.expect("center");
    assert_eq!(info.threshold_meters, 50.0);
}

#[tokio::test]
async fn test_restored_members_only_window_rejects_non_members() {
    let mut first = TestApp::new();
    first
        .store
        .create_participant(NewParticipant {
            external_id: ParticipantId::new("S9"),
            name: "Outsider".into(),
        })
        .await
        .expect("participant");
    let id = first.open_session(true).await;
    first.sync().await;
    first.registry.close_all().await;

    let second = TestApp::with_store(Arc::clone(&first.store), MembershipFailurePolicy::Deny);
    second.clock.advance(Duration::seconds(30));

    let status = second.services.windows.window_status(id).await.expect("status");
    assert!(status.active);
    assert_eq!(status.scope, ScopeMode::MembersOnly);

    let err = second
        .services
        .submissions
        .submit(id, north_of_center("S9", "Outsider", 10.0))
        .await
        .expect_err("not on the roster");
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_restart_during_restore_does_not_carry_old_submissions() {
    let mut first = TestApp::new();
    first
        .store
        .create_participant(NewParticipant {
            external_id: ParticipantId::new("S1"),
            name: "Ada".into(),
        })
        .await
        .expect("participant");
    let id = first.open_session(false).await;
    first
        .services
        .submissions
        .submit(id, north_of_center("S1", "Ada", 20.0))
        .await
        .expect("submit");
    first.sync().await;
    first.registry.close_all().await;
    assert_eq!(first.store.list_attendance(id).await.expect("rows").len(), 1);

    let second = TestApp::with_store(Arc::clone(&first.store), MembershipFailurePolicy::Deny);
    second.clock.advance(Duration::seconds(60));
    let calls_before = second.store.call_count();
    let gate = second.store.hold_attendance_reads().await;

    // Restore fetches the row, then waits on the attendance read.
    let restoring = {
        let windows = second.services.windows.clone();
        tokio::spawn(async move { windows.window_status(id).await })
    };
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while second.store.call_count() < calls_before + 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("restore reached the attendance read");

    second
        .services
        .windows
        .start_window(id, StartWindowRequest::default())
        .await
        .expect("restart");
    drop(gate);
    restoring.await.expect("task").expect("status");

    assert!(second.services.submissions.list_records(id).await.expect("records").is_empty());
    let receipt = second
        .services
        .submissions
        .submit(id, north_of_center("S1", "Ada", 20.0))
        .await
        .expect("new window accepts a fresh submission");
    assert_eq!(receipt.status, AttendanceStatus::Present);
}

#[tokio::test]
async fn test_participant_history_spans_sessions() {
    let mut app = TestApp::new();
    app.store
        .create_participant(NewParticipant {
            external_id: ParticipantId::new("S1"),
            name: "Ada".into(),
        })
        .await
        .expect("participant");
    for meters in [10.0, 90.0] {
        let id = app.open_session(false).await;
        app.services
            .submissions
            .submit(id, north_of_center("S1", "Ada", meters))
            .await
            .expect("submit");
    }
    app.sync().await;

    let history = app.services.submissions.attendance_history("S1").await.expect("history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.session_name == "Field Lab"));
    let mut statuses: Vec<_> = history.iter().map(|h| h.status).collect();
    statuses.sort_by_key(|s| s.as_str());
    assert_eq!(statuses, vec![AttendanceStatus::Absent, AttendanceStatus::Present]);
}
