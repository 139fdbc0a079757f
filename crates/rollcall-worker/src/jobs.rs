//! Durability jobs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use rollcall_core::types::{AttendanceStatus, ParticipantId, SessionId, SessionPatch};

/// A write to apply to the remote store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncJob {
    /// Persist session metadata (center, name, status, window times).
    UpdateSession {
        session_id: SessionId,
        patch: SessionPatch,
    },
    /// Persist an accepted submission. The participant's store identity is
    /// resolved when the job runs.
    RecordAttendance {
        session_id: SessionId,
        participant_id: ParticipantId,
        status: AttendanceStatus,
        distance_meters: f64,
        latitude: f64,
        longitude: f64,
        submitted_at: DateTime<Utc>,
    },
}

impl SyncJob {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateSession { .. } => "update_session",
            Self::RecordAttendance { .. } => "record_attendance",
        }
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            Self::UpdateSession { session_id, .. } | Self::RecordAttendance { session_id, .. } => {
                *session_id
            }
        }
    }
}
