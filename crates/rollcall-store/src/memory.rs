//! Process-local [`AttendanceStore`] backed by concurrent maps.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{RwLock, RwLockWriteGuard};

use rollcall_core::error::AppError;
use rollcall_core::result::AppResult;
use rollcall_core::traits::AttendanceStore;
use rollcall_core::types::{
    AdminId, AttendanceHistoryEntry, AttendanceRecord, NewParticipant, NewSession, PageRequest,
    PageResponse, Participant, ParticipantId, ParticipantKey, ParticipantPage, SessionId,
    SessionPatch, SessionStatus, SessionSummary, StoredAttendance, StoredSession,
};

/// In-memory store.
///
/// Nothing survives a restart. The store can be switched into an
/// "unavailable" mode where every call fails, it counts calls so that
/// cache behavior can be observed from the outside, and attendance reads
/// can be held in flight.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<SessionId, StoredSession>,
    participants: DashMap<ParticipantKey, Participant>,
    by_external_id: DashMap<ParticipantId, ParticipantKey>,
    rosters: DashMap<SessionId, BTreeSet<ParticipantKey>>,
    attendance: DashMap<(SessionId, ParticipantKey), AttendanceRecord>,
    unavailable: AtomicBool,
    calls: AtomicU64,
    attendance_gate: RwLock<()>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of calls made against the store so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Block `list_attendance` calls after they are counted, until the
    /// returned guard is dropped.
    pub async fn hold_attendance_reads(&self) -> RwLockWriteGuard<'_, ()> {
        self.attendance_gate.write().await
    }

    /// Insert a full session row, bypassing `create_session`.
    pub fn seed_session(&self, session: StoredSession) {
        self.sessions.insert(session.id, session);
    }

    fn touch(&self) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::external("Attendance store is unavailable"));
        }
        Ok(())
    }

    fn participant(&self, key: &ParticipantKey) -> Option<Participant> {
        self.participants.get(key).map(|p| p.value().clone())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn create_session(&self, new: NewSession) -> AppResult<StoredSession> {
        self.touch()?;
        let session = StoredSession {
            id: SessionId::new(),
            name: new.name,
            admin_id: Some(new.admin_id),
            status: SessionStatus::Inactive,
            center_lat: None,
            center_lon: None,
            threshold_meters: None,
            window_start: None,
            window_end: None,
            members_only: None,
            created_at: Some(Utc::now()),
        };
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn delete_session(&self, id: SessionId) -> AppResult<()> {
        self.touch()?;
        self.sessions.remove(&id);
        self.rosters.remove(&id);
        self.attendance.retain(|(session, _), _| *session != id);
        Ok(())
    }

    async fn fetch_session(&self, id: SessionId) -> AppResult<Option<StoredSession>> {
        self.touch()?;
        Ok(self.sessions.get(&id).map(|s| s.value().clone()))
    }

    async fn update_session(&self, id: SessionId, patch: &SessionPatch) -> AppResult<()> {
        self.touch()?;
        if let Some(mut session) = self.sessions.get_mut(&id) {
            patch.apply_to(session.value_mut());
        }
        Ok(())
    }

    async fn list_sessions_for_admin(&self, admin: AdminId) -> AppResult<Vec<SessionSummary>> {
        self.touch()?;
        let mut sessions: Vec<SessionSummary> = self
            .sessions
            .iter()
            .filter(|s| s.admin_id == Some(admin))
            .map(|s| s.summary())
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn resolve_participants(
        &self,
        ids: &[ParticipantId],
    ) -> AppResult<HashMap<ParticipantId, ParticipantKey>> {
        self.touch()?;
        Ok(ids
            .iter()
            .filter_map(|id| self.by_external_id.get(id).map(|key| (id.clone(), *key)))
            .collect())
    }

    async fn is_member(&self, session: SessionId, participant: ParticipantKey) -> AppResult<bool> {
        self.touch()?;
        Ok(self
            .rosters
            .get(&session)
            .is_some_and(|roster| roster.contains(&participant)))
    }

    async fn add_members(&self, session: SessionId, participants: &[ParticipantKey]) -> AppResult<()> {
        self.touch()?;
        self.rosters
            .entry(session)
            .or_default()
            .extend(participants.iter().copied());
        Ok(())
    }

    async fn list_members(&self, session: SessionId) -> AppResult<Vec<Participant>> {
        self.touch()?;
        let keys: Vec<ParticipantKey> = self
            .rosters
            .get(&session)
            .map(|roster| roster.iter().copied().collect())
            .unwrap_or_default();
        let mut members: Vec<Participant> =
            keys.iter().filter_map(|key| self.participant(key)).collect();
        members.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(members)
    }

    async fn sessions_of_participant(&self, participant: ParticipantKey) -> AppResult<Vec<SessionId>> {
        self.touch()?;
        Ok(self
            .rosters
            .iter()
            .filter(|roster| roster.value().contains(&participant))
            .map(|roster| *roster.key())
            .collect())
    }

    async fn record_attendance(&self, record: &AttendanceRecord) -> AppResult<()> {
        self.touch()?;
        self.attendance
            .insert((record.session_id, record.participant_key), record.clone());
        Ok(())
    }

    async fn list_attendance(&self, session: SessionId) -> AppResult<Vec<StoredAttendance>> {
        self.touch()?;
        let _gate = self.attendance_gate.read().await;
        let records: Vec<AttendanceRecord> = self
            .attendance
            .iter()
            .filter(|r| r.session_id == session)
            .map(|r| r.value().clone())
            .collect();
        let mut rows: Vec<StoredAttendance> = records
            .into_iter()
            .filter_map(|r| {
                self.participant(&r.participant_key).map(|participant| StoredAttendance {
                    participant,
                    status: r.status,
                    distance_meters: r.distance_meters,
                    latitude: r.latitude,
                    longitude: r.longitude,
                    submitted_at: r.submitted_at,
                })
            })
            .collect();
        rows.sort_by_key(|r| r.submitted_at);
        Ok(rows)
    }

    async fn attendance_history(
        &self,
        participant: ParticipantKey,
    ) -> AppResult<Vec<AttendanceHistoryEntry>> {
        self.touch()?;
        let records: Vec<AttendanceRecord> = self
            .attendance
            .iter()
            .filter(|r| r.participant_key == participant)
            .map(|r| r.value().clone())
            .collect();
        let mut history: Vec<AttendanceHistoryEntry> = records
            .into_iter()
            .map(|r| AttendanceHistoryEntry {
                session_id: r.session_id,
                session_name: self
                    .sessions
                    .get(&r.session_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| "N/A".to_string()),
                status: r.status,
                distance_meters: r.distance_meters,
                latitude: r.latitude,
                longitude: r.longitude,
                submitted_at: r.submitted_at,
            })
            .collect();
        history.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(history)
    }

    async fn create_participant(&self, new: NewParticipant) -> AppResult<Participant> {
        self.touch()?;
        match self.by_external_id.entry(new.external_id.clone()) {
            Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Participant '{}' already exists",
                new.external_id
            ))),
            Entry::Vacant(slot) => {
                let participant = Participant {
                    key: ParticipantKey::new(),
                    external_id: new.external_id,
                    name: new.name,
                };
                slot.insert(participant.key);
                self.participants
                    .insert(participant.key, participant.clone());
                Ok(participant)
            }
        }
    }

    async fn list_participants(&self, page: PageRequest) -> AppResult<ParticipantPage> {
        self.touch()?;
        let mut all: Vec<Participant> = self.participants.iter().map(|p| p.value().clone()).collect();
        all.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok(PageResponse::new(items, page, total))
    }
}
