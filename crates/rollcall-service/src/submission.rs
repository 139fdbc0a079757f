//! Attendance submission, records, export, and history.

use std::sync::Arc;

use tracing::{debug, info, warn};

use rollcall_core::config::session::MembershipFailurePolicy;
use rollcall_core::error::AppError;
use rollcall_core::result::AppResult;
use rollcall_core::types::{AttendanceHistoryEntry, GeoPoint, ParticipantId, ScopeMode, SessionId};
use rollcall_session::audit::render_document;
use rollcall_session::{MembershipProof, Rejection, Session, SubmissionAttempt, SubmissionRecord};
use rollcall_worker::SyncJob;

use crate::context::ServiceContext;
use crate::dto::{SubmissionReceipt, SubmitAttendanceRequest, validate_request};

/// Participant-facing submission flow.
#[derive(Debug, Clone)]
pub struct SubmissionService {
    context: Arc<ServiceContext>,
}

impl SubmissionService {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self { context }
    }

    /// Submit a location to a session's open window.
    ///
    /// Checks run in order: window open, roster membership (members-only
    /// windows), no prior submission. Membership is looked up before the
    /// session lock is taken; if the window is restarted as members-only
    /// in between, the check is redone once.
    pub async fn submit(
        &self,
        id: SessionId,
        req: SubmitAttendanceRequest,
    ) -> AppResult<SubmissionReceipt> {
        validate_request(&req)?;
        let session = self.context.existing_session(id).await?;
        let attempt = SubmissionAttempt {
            participant_id: ParticipantId::new(&req.participant_id),
            name: req.name.trim().to_string(),
            location: GeoPoint::new(req.latitude, req.longitude),
        };

        let record = self.commit_with_recheck(&session, attempt).await?;

        self.context.queue.enqueue(SyncJob::RecordAttendance {
            session_id: id,
            participant_id: record.participant_id.clone(),
            status: record.status,
            distance_meters: record.distance_meters,
            latitude: record.location.latitude,
            longitude: record.location.longitude,
            submitted_at: record.submitted_at,
        });

        info!(
            session_id = %id,
            participant = %record.participant_id,
            status = %record.status,
            distance_meters = record.distance_meters.round() as i64,
            "Attendance recorded"
        );
        Ok(SubmissionReceipt::new(id, &record))
    }

    async fn commit_with_recheck(
        &self,
        session: &Session,
        attempt: SubmissionAttempt,
    ) -> AppResult<SubmissionRecord> {
        let mut rechecked = false;
        loop {
            let proof = match session.open_scope().await? {
                ScopeMode::OpenToAll => MembershipProof::NotRequired,
                ScopeMode::MembersOnly => {
                    self.verify_membership(session.id(), &attempt.participant_id)
                        .await?
                }
            };
            match session.commit(attempt.clone(), proof).await {
                Ok(record) => return Ok(record),
                Err(Rejection::ScopeChanged) if !rechecked => {
                    debug!(session_id = %session.id(), "Scope changed during submission; rechecking");
                    rechecked = true;
                }
                Err(rejection) => return Err(rejection.into()),
            }
        }
    }

    /// Ask the store whether the participant is on the roster, applying the
    /// configured policy when the store cannot answer.
    async fn verify_membership(
        &self,
        session_id: SessionId,
        participant: &ParticipantId,
    ) -> Result<MembershipProof, Rejection> {
        match self.is_member(session_id, participant).await {
            Ok(true) => Ok(MembershipProof::Verified),
            Ok(false) => Err(Rejection::NotMember),
            Err(e) => match self.context.membership_failure_policy {
                MembershipFailurePolicy::Deny => {
                    warn!(%session_id, participant = %participant, error = %e, "Membership check failed; denying");
                    Err(Rejection::MembershipUnverified)
                }
                MembershipFailurePolicy::Allow => {
                    warn!(%session_id, participant = %participant, error = %e, "Membership check failed; allowing");
                    Ok(MembershipProof::Verified)
                }
            },
        }
    }

    async fn is_member(&self, session_id: SessionId, participant: &ParticipantId) -> AppResult<bool> {
        let resolved = self
            .context
            .store
            .resolve_participants(std::slice::from_ref(participant))
            .await?;
        match resolved.get(participant) {
            Some(key) => self.context.store.is_member(session_id, *key).await,
            None => Ok(false),
        }
    }

    /// Accepted submissions of the current window. A session with none in
    /// memory (typically after a restart) is filled from the store with the
    /// rows submitted since the window started.
    pub async fn list_records(&self, id: SessionId) -> AppResult<Vec<SubmissionRecord>> {
        let session = self.context.existing_session(id).await?;
        let records = session.records().await;
        if !records.is_empty() {
            return Ok(records);
        }

        let (epoch, since) = session.window_mark().await;
        let restored = match self.context.stored_records(id, since).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Could not load stored attendance");
                return Ok(records);
            }
        };
        let added = session.hydrate_records(epoch, restored).await;
        if added > 0 {
            debug!(session_id = %id, added, "Records restored from store");
        }
        Ok(session.records().await)
    }

    /// The session's audit trail as CSV. Rendered from stored attendance
    /// when no local log exists or it cannot be read.
    pub async fn export_audit(&self, id: SessionId) -> AppResult<String> {
        let session = self.context.existing_session(id).await?;
        match session.export_audit().await {
            Some(Ok(contents)) => return Ok(contents),
            Some(Err(e)) => {
                warn!(session_id = %id, error = %e, "Audit log unreadable; rendering from store");
            }
            None => debug!(session_id = %id, "No local audit log; rendering from store"),
        }
        let rows = self.context.store.list_attendance(id).await?;
        Ok(render_document(rows.iter().map(|row| {
            (row.participant.name.as_str(), row.submitted_at, row.distance_meters)
        })))
    }

    /// Every stored submission by a participant, newest first.
    pub async fn attendance_history(&self, participant_id: &str) -> AppResult<Vec<AttendanceHistoryEntry>> {
        let participant = ParticipantId::new(participant_id);
        if participant.is_empty() {
            return Err(AppError::validation("Participant id is required"));
        }
        let resolved = self
            .context
            .store
            .resolve_participants(std::slice::from_ref(&participant))
            .await?;
        let key = resolved
            .get(&participant)
            .copied()
            .ok_or_else(|| AppError::not_found("Participant not found"))?;
        self.context.store.attendance_history(key).await
    }
}
