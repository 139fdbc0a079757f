//! Dependencies shared by every service, and session resolution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use rollcall_cache::CacheSet;
use rollcall_core::config::session::MembershipFailurePolicy;
use rollcall_core::error::AppError;
use rollcall_core::result::AppResult;
use rollcall_core::traits::AttendanceStore;
use rollcall_core::types::{GeoPoint, SessionId, SessionPatch, SessionStatus, StoredSession};
use rollcall_session::{Session, SessionRegistry, SubmissionRecord};
use rollcall_worker::{SyncJob, SyncQueue};

/// Everything a service needs, built once by the process entry point.
#[derive(Debug)]
pub struct ServiceContext {
    pub store: Arc<dyn AttendanceStore>,
    pub registry: Arc<SessionRegistry>,
    pub caches: CacheSet,
    pub queue: SyncQueue,
    pub membership_failure_policy: MembershipFailurePolicy,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        registry: Arc<SessionRegistry>,
        caches: CacheSet,
        queue: SyncQueue,
        membership_failure_policy: MembershipFailurePolicy,
    ) -> Self {
        Self {
            store,
            registry,
            caches,
            queue,
            membership_failure_policy,
        }
    }

    /// The live session for `id`, creating it on first reference.
    ///
    /// A newly created session is filled from its persisted row when the
    /// store has one; store failures only cost that enrichment.
    pub async fn session(&self, id: SessionId) -> Arc<Session> {
        if let Some(session) = self.registry.get(id) {
            return session;
        }
        let session = self.registry.get_or_create(id);
        match self.store.fetch_session(id).await {
            Ok(Some(stored)) => self.restore(&session, &stored).await,
            Ok(None) => {}
            Err(e) => warn!(session_id = %id, error = %e, "Could not load session metadata"),
        }
        session
    }

    /// The live session for `id`, loading it from the store if it is not
    /// in memory. Ids unknown to both are `NotFound`.
    pub async fn existing_session(&self, id: SessionId) -> AppResult<Arc<Session>> {
        if let Some(session) = self.registry.get(id) {
            return Ok(session);
        }
        let stored = self
            .store
            .fetch_session(id)
            .await?
            .ok_or_else(|| AppError::not_found("Session not found"))?;
        let session = self.registry.get_or_create(id);
        self.restore(&session, &stored).await;
        Ok(session)
    }

    /// Hand a metadata update to the sync queue.
    pub fn persist(&self, session_id: SessionId, patch: SessionPatch) {
        if patch.is_empty() {
            return;
        }
        self.queue.enqueue(SyncJob::UpdateSession { session_id, patch });
    }

    /// Stored submissions for `id` made at or after `since`.
    pub async fn stored_records(
        &self,
        id: SessionId,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<SubmissionRecord>> {
        let rows = self.store.list_attendance(id).await?;
        Ok(rows
            .into_iter()
            .filter(|row| since.is_none_or(|start| row.submitted_at >= start))
            .map(|row| SubmissionRecord {
                participant_id: row.participant.external_id,
                name: row.participant.name,
                location: GeoPoint::new(row.latitude, row.longitude),
                distance_meters: row.distance_meters,
                submitted_at: row.submitted_at,
                status: row.status,
            })
            .collect())
    }

    /// Fill a freshly registered session from its row. A window that is
    /// still open gets its submissions back so nobody can submit twice
    /// across a restart.
    async fn restore(&self, session: &Arc<Session>, stored: &StoredSession) {
        session.apply_metadata(stored).await;
        if stored.status != SessionStatus::Active {
            return;
        }
        let (Some(start), Some(end)) = (stored.window_start, stored.window_end) else {
            return;
        };
        let Some(epoch) = session.restore_window(start, end, stored.scope()).await else {
            return;
        };
        debug!(session_id = %stored.id, "Window restored from store");
        if !session.window_status().await.active {
            return;
        }
        match self.stored_records(stored.id, Some(start)).await {
            Ok(records) => {
                let restored = session.hydrate_records(epoch, records).await;
                debug!(session_id = %stored.id, restored, "Submissions restored from store");
            }
            Err(e) => warn!(session_id = %stored.id, error = %e, "Could not restore submissions"),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rollcall_core::config::cache::CacheConfig;
    use rollcall_session::{ManualClock, SessionRuntime};
    use rollcall_store::MemoryStore;

    /// A context over a memory store, a manual clock, and a temp audit dir.
    pub(crate) struct Fixture {
        pub store: Arc<MemoryStore>,
        pub clock: Arc<ManualClock>,
        pub context: Arc<ServiceContext>,
        pub _dir: tempfile::TempDir,
    }

    pub(crate) fn fixture(policy: MembershipFailurePolicy) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap(),
        ));
        let runtime = Arc::new(SessionRuntime::new(
            clock.clone(),
            chrono::Duration::seconds(600),
            dir.path(),
        ));
        let context = Arc::new(ServiceContext::new(
            store.clone(),
            Arc::new(SessionRegistry::new(runtime)),
            CacheSet::new(&CacheConfig::default()),
            SyncQueue::disabled(),
            policy,
        ));
        Fixture {
            store,
            clock,
            context,
            _dir: dir,
        }
    }
}
