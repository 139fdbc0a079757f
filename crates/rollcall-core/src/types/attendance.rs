//! Attendance records as held by the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ParticipantKey, SessionId};
use super::participant::Participant;

/// Present/absent classification of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    /// Within the threshold of the center.
    Present,
    /// Beyond the threshold.
    Absent,
}

impl AttendanceStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An accepted submission to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub session_id: SessionId,
    pub participant_key: ParticipantKey,
    pub status: AttendanceStatus,
    pub distance_meters: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub submitted_at: DateTime<Utc>,
}

/// A persisted submission joined with its participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAttendance {
    pub participant: Participant,
    pub status: AttendanceStatus,
    pub distance_meters: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub submitted_at: DateTime<Utc>,
}

/// One line of a participant's attendance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceHistoryEntry {
    pub session_id: SessionId,
    pub session_name: String,
    pub status: AttendanceStatus,
    pub distance_meters: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub submitted_at: DateTime<Utc>,
}
