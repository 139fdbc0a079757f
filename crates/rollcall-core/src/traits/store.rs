//! The remote attendance store boundary.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{
    AdminId, AttendanceHistoryEntry, AttendanceRecord, NewParticipant, NewSession, PageRequest,
    Participant, ParticipantId, ParticipantKey, ParticipantPage, SessionId, SessionPatch,
    SessionSummary, StoredAttendance, StoredSession,
};

/// Durable storage for sessions, rosters, participants, and submissions.
///
/// Every method may fail independently. Live window state never depends
/// on the store; it is consulted for identity resolution, roster checks,
/// and recovery after a restart.
#[async_trait]
pub trait AttendanceStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a session with status `inactive`.
    async fn create_session(&self, new: NewSession) -> AppResult<StoredSession>;

    /// Delete a session row. Missing rows are not an error.
    async fn delete_session(&self, id: SessionId) -> AppResult<()>;

    /// Fetch a session row.
    async fn fetch_session(&self, id: SessionId) -> AppResult<Option<StoredSession>>;

    /// Apply a partial update.
    async fn update_session(&self, id: SessionId, patch: &SessionPatch) -> AppResult<()>;

    /// Sessions owned by an admin, newest first.
    async fn list_sessions_for_admin(&self, admin: AdminId) -> AppResult<Vec<SessionSummary>>;

    /// Map external ids to store identities. Unknown ids are absent from
    /// the result.
    async fn resolve_participants(
        &self,
        ids: &[ParticipantId],
    ) -> AppResult<HashMap<ParticipantId, ParticipantKey>>;

    /// Whether a participant is on the session's roster.
    async fn is_member(&self, session: SessionId, participant: ParticipantKey) -> AppResult<bool>;

    /// Add participants to a roster, ignoring ones already present.
    async fn add_members(&self, session: SessionId, participants: &[ParticipantKey]) -> AppResult<()>;

    /// Roster of a session.
    async fn list_members(&self, session: SessionId) -> AppResult<Vec<Participant>>;

    /// Sessions whose roster contains the participant.
    async fn sessions_of_participant(&self, participant: ParticipantKey) -> AppResult<Vec<SessionId>>;

    /// Persist an accepted submission, replacing any earlier row for the
    /// same session and participant.
    async fn record_attendance(&self, record: &AttendanceRecord) -> AppResult<()>;

    /// Submissions for a session, oldest first.
    async fn list_attendance(&self, session: SessionId) -> AppResult<Vec<StoredAttendance>>;

    /// A participant's submissions across sessions, newest first.
    async fn attendance_history(
        &self,
        participant: ParticipantKey,
    ) -> AppResult<Vec<AttendanceHistoryEntry>>;

    /// Register a participant. Fails with a conflict if the external id exists.
    async fn create_participant(&self, new: NewParticipant) -> AppResult<Participant>;

    /// One page of the participant directory, ordered by external id.
    async fn list_participants(&self, page: PageRequest) -> AppResult<ParticipantPage>;
}
