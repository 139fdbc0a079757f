//! One group's live attendance state.
//!
//! All mutable fields sit behind a single `tokio::sync::RwLock`. The only
//! I/O performed while the lock is held is the local audit-log append and
//! flush; calls to the remote store happen before the lock is taken.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use rollcall_core::config::audit::AuditConfig;
use rollcall_core::config::session::SessionConfig;
use rollcall_core::error::AppError;
use rollcall_core::result::AppResult;
use rollcall_core::types::{AdminId, GeoPoint, ParticipantId, ScopeMode, SessionId, StoredSession};

use crate::audit::AuditLog;
use crate::clock::Clock;
use crate::geo;
use crate::ledger::{SubmissionLedger, SubmissionRecord};
use crate::timer::WindowTimer;
use crate::window::{WindowPhase, WindowState};

/// Settings and collaborators shared by every session in a registry.
#[derive(Debug)]
pub struct SessionRuntime {
    pub clock: Arc<dyn Clock>,
    pub window_duration: Duration,
    pub audit_dir: PathBuf,
}

impl SessionRuntime {
    pub fn new(clock: Arc<dyn Clock>, window_duration: Duration, audit_dir: impl Into<PathBuf>) -> Self {
        Self {
            clock,
            window_duration,
            audit_dir: audit_dir.into(),
        }
    }

    pub fn from_config(session: &SessionConfig, audit: &AuditConfig, clock: Arc<dyn Clock>) -> Self {
        let seconds = i64::try_from(session.window_duration_seconds).unwrap_or(i64::MAX);
        Self::new(clock, Duration::seconds(seconds), &audit.directory)
    }
}

/// Why a submission was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Attendance window is closed")]
    WindowClosed,
    #[error("You are not a member of this group. Attendance is restricted to group members only.")]
    NotMember,
    #[error("Group membership could not be verified")]
    MembershipUnverified,
    #[error("Already submitted")]
    AlreadySubmitted,
    #[error("The attendance window was restarted with a different scope")]
    ScopeChanged,
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        let message = rejection.to_string();
        match rejection {
            Rejection::WindowClosed | Rejection::NotMember => AppError::forbidden(message),
            Rejection::MembershipUnverified => AppError::service_unavailable(message),
            Rejection::AlreadySubmitted | Rejection::ScopeChanged => AppError::conflict(message),
        }
    }
}

/// A participant's location report.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionAttempt {
    pub participant_id: ParticipantId,
    pub name: String,
    pub location: GeoPoint,
}

/// What the caller established about roster membership before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipProof {
    /// The window was open to all when checked.
    NotRequired,
    /// The participant is on the roster, or policy allowed it through.
    Verified,
}

/// Result of starting a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStarted {
    pub session_id: SessionId,
    pub name: String,
    pub scope: ScopeMode,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Point-in-time view of a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStatus {
    pub session_id: SessionId,
    pub name: String,
    pub phase: WindowPhase,
    pub active: bool,
    pub scope: ScopeMode,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub remaining_seconds: u64,
}

/// Center and threshold as configured by the admin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CenterInfo {
    pub center: Option<GeoPoint>,
    pub threshold_meters: f64,
    pub name: String,
    pub window_active: bool,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    name: String,
    admin_id: Option<AdminId>,
    center: GeoPoint,
    threshold_meters: f64,
    window: WindowState,
    ledger: SubmissionLedger,
    audit: Option<AuditLog>,
    timer: Option<WindowTimer>,
}

impl SessionState {
    fn status(&self, id: SessionId, now: DateTime<Utc>) -> WindowStatus {
        WindowStatus {
            session_id: id,
            name: self.name.clone(),
            phase: self.window.phase(now),
            active: self.window.is_open_at(now),
            scope: self.window.scope(),
            started_at: self.window.started_at(),
            ends_at: self.window.ends_at(),
            remaining_seconds: self.window.remaining_seconds(now),
        }
    }
}

/// A group's live state.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    runtime: Arc<SessionRuntime>,
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new(id: SessionId, runtime: Arc<SessionRuntime>) -> Self {
        Self {
            id,
            runtime,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    fn now(&self) -> DateTime<Utc> {
        self.runtime.clock.now()
    }

    pub async fn name(&self) -> String {
        self.state.read().await.name.clone()
    }

    pub async fn admin_id(&self) -> Option<AdminId> {
        self.state.read().await.admin_id
    }

    /// Fill fields that are still unset from a persisted row.
    pub async fn apply_metadata(&self, stored: &StoredSession) {
        let mut state = self.state.write().await;
        if state.name.is_empty() && !stored.name.is_empty() {
            state.name = stored.name.clone();
        }
        if state.admin_id.is_none() {
            state.admin_id = stored.admin_id;
        }
        if state.center.is_unset() {
            if let Some(center) = stored.center() {
                state.center = center;
                if let Some(threshold) = stored.threshold_meters {
                    state.threshold_meters = threshold;
                }
            }
        }
    }

    /// Set the geofence center and threshold, optionally renaming.
    pub async fn set_center(&self, center: GeoPoint, threshold_meters: f64, name: Option<String>) {
        let mut state = self.state.write().await;
        state.center = center;
        state.threshold_meters = threshold_meters;
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            state.name = name;
        }
        info!(
            session_id = %self.id,
            lat = center.latitude,
            lon = center.longitude,
            threshold_meters,
            "Session center set"
        );
    }

    pub async fn rename(&self, name: impl Into<String>) {
        self.state.write().await.name = name.into();
    }

    pub async fn center_info(&self) -> CenterInfo {
        let now = self.now();
        let state = self.state.read().await;
        CenterInfo {
            center: (!state.center.is_unset()).then_some(state.center),
            threshold_meters: state.threshold_meters,
            name: state.name.clone(),
            window_active: state.window.is_open_at(now),
        }
    }

    /// Start (or restart) the attendance window.
    ///
    /// Resets the ledger, creates the audit log on first use, and arms a
    /// timer that closes this window when it ends. A timer armed by an
    /// earlier start is disarmed.
    pub async fn start_window(self: &Arc<Self>, scope: ScopeMode) -> WindowStarted {
        let now = self.now();
        let duration = self.runtime.window_duration;
        let mut state = self.state.write().await;

        state.ledger.reset();
        let epoch = state.window.start(now, duration, scope);

        if state.audit.is_none() {
            match AuditLog::create(&self.runtime.audit_dir, &state.name, now).await {
                Ok(log) => state.audit = Some(log),
                Err(e) => warn!(
                    session_id = %self.id,
                    error = %e,
                    "Audit log unavailable; submissions will not be written to disk"
                ),
            }
        }

        let after = duration.to_std().unwrap_or_default();
        state.timer = Some(WindowTimer::arm(Arc::downgrade(self), epoch, after));

        info!(
            session_id = %self.id,
            scope = ?scope,
            epoch,
            ends_at = %(now + duration),
            "Attendance window started"
        );

        WindowStarted {
            session_id: self.id,
            name: state.name.clone(),
            scope,
            started_at: now,
            ends_at: now + duration,
        }
    }

    /// Reinstate a window recorded in the store after a restart. Only
    /// applies while the window has never been started in this process;
    /// returns the restored window's epoch when it did.
    pub async fn restore_window(
        self: &Arc<Self>,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        scope: ScopeMode,
    ) -> Option<u64> {
        let now = self.now();
        let mut state = self.state.write().await;
        if state.window.phase(now) != WindowPhase::Idle {
            return None;
        }
        let epoch = state.window.restore(started_at, ends_at, scope, now);
        if state.window.is_open_at(now) {
            let after = (ends_at - now).to_std().unwrap_or_default();
            state.timer = Some(WindowTimer::arm(Arc::downgrade(self), epoch, after));
        }
        debug!(
            session_id = %self.id,
            scope = ?scope,
            active = state.window.is_open_at(now),
            "Window restored"
        );
        Some(epoch)
    }

    /// Close the window and flush the audit log. Returns whether a window
    /// was active.
    pub async fn close_window(&self) -> bool {
        let mut state = self.state.write().await;
        let was_active = state.window.close();
        if let Some(timer) = state.timer.take() {
            timer.disarm();
        }
        if let Some(audit) = state.audit.as_mut() {
            if let Err(e) = audit.flush().await {
                warn!(session_id = %self.id, error = %e, "Failed to flush audit log");
            }
        }
        info!(session_id = %self.id, was_active, "Attendance window closed");
        was_active
    }

    /// Timer callback. Leaves the timer slot alone: the timer is the
    /// running task.
    pub(crate) async fn expire_window(&self, epoch: u64) {
        let mut state = self.state.write().await;
        if state.window.expire_epoch(epoch) {
            info!(session_id = %self.id, epoch, "Attendance window expired");
        }
    }

    /// Current window status, performing the lazy expiry flip if due.
    pub async fn window_status(&self) -> WindowStatus {
        let now = self.now();
        {
            let state = self.state.read().await;
            if !state.window.is_due(now) {
                return state.status(self.id, now);
            }
        }
        let mut state = self.state.write().await;
        if state.window.expire_if_due(now) {
            info!(session_id = %self.id, "Attendance window expired on read");
        }
        state.status(self.id, now)
    }

    /// Scope of the open window, or `WindowClosed`.
    pub async fn open_scope(&self) -> Result<ScopeMode, Rejection> {
        let now = self.now();
        let state = self.state.read().await;
        if state.window.is_open_at(now) {
            Ok(state.window.scope())
        } else {
            Err(Rejection::WindowClosed)
        }
    }

    /// Accept a submission under the write lock.
    ///
    /// Re-checks that the window is still open and that the participant
    /// has not already submitted, then classifies, records, and appends
    /// to the audit log as one step.
    pub async fn commit(
        &self,
        attempt: SubmissionAttempt,
        proof: MembershipProof,
    ) -> Result<SubmissionRecord, Rejection> {
        let now = self.now();
        let mut state = self.state.write().await;

        state.window.expire_if_due(now);
        if !state.window.is_open_at(now) {
            return Err(Rejection::WindowClosed);
        }
        if state.window.scope() == ScopeMode::MembersOnly && proof == MembershipProof::NotRequired {
            return Err(Rejection::ScopeChanged);
        }
        if state.ledger.has_submitted(&attempt.participant_id) {
            return Err(Rejection::AlreadySubmitted);
        }

        let distance = geo::distance_meters(state.center, attempt.location);
        let status = geo::classify(distance, state.threshold_meters);
        let name = if attempt.name.trim().is_empty() {
            attempt.participant_id.to_string()
        } else {
            attempt.name
        };
        let record = SubmissionRecord {
            participant_id: attempt.participant_id,
            name,
            location: attempt.location,
            distance_meters: distance,
            submitted_at: now,
            status,
        };

        if let Some(audit) = state.audit.as_mut() {
            if let Err(e) = audit.append(&record.name, now, distance).await {
                warn!(session_id = %self.id, error = %e, "Failed to append to audit log");
            }
        }
        state.ledger.insert(record.clone());

        debug!(
            session_id = %self.id,
            participant = %record.participant_id,
            distance_meters = distance,
            status = %status,
            "Submission accepted"
        );
        Ok(record)
    }

    /// Accepted submissions of the current window, in acceptance order.
    pub async fn records(&self) -> Vec<SubmissionRecord> {
        self.state.read().await.ledger.records()
    }

    /// Epoch and start time of the current window.
    pub async fn window_mark(&self) -> (u64, Option<DateTime<Utc>>) {
        let state = self.state.read().await;
        (state.window.epoch(), state.window.started_at())
    }

    /// Load persisted submissions fetched for window `epoch`. Nothing is
    /// added if another window has started since, or if the ledger is no
    /// longer empty. Returns how many were added.
    pub async fn hydrate_records(&self, epoch: u64, records: Vec<SubmissionRecord>) -> usize {
        let mut state = self.state.write().await;
        if state.window.epoch() != epoch {
            debug!(session_id = %self.id, epoch, "Discarding records fetched for a replaced window");
            return 0;
        }
        if !state.ledger.is_empty() {
            return 0;
        }
        state.ledger.hydrate(records)
    }

    /// Flushed contents of the audit log, or `None` if no log exists.
    pub async fn export_audit(&self) -> Option<AppResult<String>> {
        let mut state = self.state.write().await;
        match state.audit.as_mut() {
            Some(audit) => Some(audit.read_contents().await),
            None => None,
        }
    }

    /// Disarm the timer and close the audit log.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        if let Some(timer) = state.timer.take() {
            timer.disarm();
        }
        if let Some(audit) = state.audit.as_mut() {
            if let Err(e) = audit.close().await {
                warn!(session_id = %self.id, error = %e, "Failed to close audit log");
            }
        }
    }

    /// Ledger keys and record keys agree.
    pub async fn is_consistent(&self) -> bool {
        self.state.read().await.ledger.is_consistent()
    }

    #[cfg(test)]
    pub(crate) async fn state_write_for_test(&self) -> tokio::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().await
    }
}
