//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use rollcall_cache::CacheSet;
use rollcall_core::config::cache::CacheConfig;
use rollcall_core::config::session::MembershipFailurePolicy;
use rollcall_core::config::worker::WorkerConfig;
use rollcall_core::types::{AdminId, GeoPoint, SessionId};
use rollcall_service::dto::{
    CreateSessionRequest, SetCenterRequest, StartWindowRequest, SubmitAttendanceRequest,
};
use rollcall_service::{ServiceContext, Services};
use rollcall_session::{ManualClock, SessionRegistry, SessionRuntime};
use rollcall_store::MemoryStore;
use rollcall_worker::{SyncExecutor, SyncQueue, SyncRunner};

/// Window length used by every fixture.
pub const WINDOW_SECONDS: i64 = 600;

/// Geofence center shared by the scenarios.
pub const CENTER: GeoPoint = GeoPoint {
    latitude: 1.0,
    longitude: 1.0,
};

/// Degrees of latitude per meter along a meridian at the mean radius.
const DEGREES_PER_METER: f64 = 1.0 / 111_194.926_644_558_73;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap()
}

/// One process worth of wiring over a shared store.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub registry: Arc<SessionRegistry>,
    pub services: Services,
    pub runner: SyncRunner,
    pub dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), MembershipFailurePolicy::Deny)
    }

    /// A fresh process over an existing store, as after a restart.
    pub fn with_store(store: Arc<MemoryStore>, policy: MembershipFailurePolicy) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = Arc::new(ManualClock::new(t0()));
        let runtime = Arc::new(SessionRuntime::new(
            clock.clone(),
            chrono::Duration::seconds(WINDOW_SECONDS),
            dir.path(),
        ));
        let registry = Arc::new(SessionRegistry::new(runtime));

        let worker = WorkerConfig {
            retry_backoff_ms: 1,
            ..WorkerConfig::default()
        };
        let (queue, receiver) = SyncQueue::channel(worker.queue_capacity);
        let runner = SyncRunner::new(SyncExecutor::new(store.clone()), receiver, &worker);

        let context = Arc::new(ServiceContext::new(
            store.clone(),
            registry.clone(),
            CacheSet::new(&CacheConfig::default()),
            queue,
            policy,
        ));

        Self {
            store,
            clock,
            registry,
            services: Services::new(context),
            runner,
            dir,
        }
    }

    /// Apply every queued durability write.
    pub async fn sync(&mut self) {
        self.runner.drain().await;
    }

    /// A session centered on [`CENTER`] with a 50 m threshold and an open
    /// window.
    pub async fn open_session(&self, members_only: bool) -> SessionId {
        let id = self
            .services
            .admin
            .create_session(CreateSessionRequest {
                name: "Field Lab".into(),
                admin_id: AdminId::new(),
            })
            .await
            .expect("create session")
            .id;
        self.services
            .admin
            .set_center(
                id,
                SetCenterRequest {
                    latitude: CENTER.latitude,
                    longitude: CENTER.longitude,
                    threshold_meters: 50.0,
                    name: None,
                },
            )
            .await
            .expect("set center");
        self.services
            .windows
            .start_window(id, StartWindowRequest { members_only })
            .await
            .expect("start window");
        id
    }
}

/// A submission `meters` north of [`CENTER`].
pub fn north_of_center(participant: &str, name: &str, meters: f64) -> SubmitAttendanceRequest {
    SubmitAttendanceRequest {
        participant_id: participant.into(),
        name: name.into(),
        latitude: CENTER.latitude + meters * DEGREES_PER_METER,
        longitude: CENTER.longitude,
    }
}
