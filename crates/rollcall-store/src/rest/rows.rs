//! Row shapes exchanged with the REST endpoint and their conversions.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use rollcall_core::types::{
    AdminId, AttendanceHistoryEntry, AttendanceRecord, AttendanceStatus, Participant,
    ParticipantId, ParticipantKey, SessionId, SessionPatch, SessionStatus, SessionSummary,
    StoredAttendance, StoredSession,
};

/// Wire format for window timestamps written to the store.
const WINDOW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
pub(crate) struct GroupRow {
    pub id: SessionId,
    #[serde(default)]
    pub name: String,
    pub admin_id: Option<AdminId>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    pub location_lat: Option<f64>,
    pub location_lon: Option<f64>,
    pub threshold_meters: Option<f64>,
    pub window_start_time: Option<String>,
    pub window_end_time: Option<String>,
    #[serde(default)]
    pub group_only: Option<bool>,
    pub created_at: Option<String>,
}

impl From<GroupRow> for StoredSession {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            admin_id: row.admin_id,
            status: row.status.unwrap_or_default(),
            center_lat: row.location_lat,
            center_lon: row.location_lon,
            threshold_meters: row.threshold_meters,
            window_start: row.window_start_time.as_deref().and_then(parse_timestamp),
            window_end: row.window_end_time.as_deref().and_then(parse_timestamp),
            members_only: row.group_only,
            created_at: row.created_at.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupSummaryRow {
    pub id: SessionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    pub created_at: Option<String>,
}

impl From<GroupSummaryRow> for SessionSummary {
    fn from(row: GroupSummaryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            status: row.status.unwrap_or_default(),
            created_at: row.created_at.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NewGroupBody<'a> {
    pub name: &'a str,
    pub admin_id: AdminId,
    pub status: SessionStatus,
}

/// Column-named form of a [`SessionPatch`].
#[derive(Debug, Default, Serialize)]
pub(crate) struct GroupPatchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_only: Option<bool>,
}

impl From<&SessionPatch> for GroupPatchBody {
    fn from(patch: &SessionPatch) -> Self {
        Self {
            name: patch.name.clone(),
            status: patch.status,
            location_lat: patch.center_lat,
            location_lon: patch.center_lon,
            threshold_meters: patch.threshold_meters,
            window_start_time: patch.window_start.map(format_timestamp),
            window_end_time: patch.window_end.map(format_timestamp),
            group_only: patch.members_only,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentRow {
    pub id: ParticipantKey,
    pub student_id: ParticipantId,
    #[serde(default)]
    pub student_name: String,
}

impl From<StudentRow> for Participant {
    fn from(row: StudentRow) -> Self {
        Self {
            key: row.id,
            external_id: row.student_id,
            name: row.student_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentKeyRow {
    pub id: ParticipantKey,
    pub student_id: ParticipantId,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewStudentBody<'a> {
    pub student_id: &'a str,
    pub student_name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct MembershipBody {
    pub group_id: SessionId,
    pub student_id: ParticipantKey,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MembershipRow {
    pub group_id: SessionId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberRow {
    pub students: Option<StudentRow>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttendanceBody {
    pub group_id: SessionId,
    pub student_id: ParticipantKey,
    pub status: AttendanceStatus,
    pub distance: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub submitted_at: DateTime<Utc>,
}

impl From<&AttendanceRecord> for AttendanceBody {
    fn from(record: &AttendanceRecord) -> Self {
        Self {
            group_id: record.session_id,
            student_id: record.participant_key,
            status: record.status,
            distance: record.distance_meters,
            latitude: record.latitude,
            longitude: record.longitude,
            submitted_at: record.submitted_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttendanceRow {
    pub student_id: ParticipantKey,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    pub submitted_at: Option<String>,
    pub students: Option<EmbeddedStudent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddedStudent {
    pub student_id: ParticipantId,
    #[serde(default)]
    pub student_name: String,
}

impl AttendanceRow {
    /// Rows whose participant was deleted are dropped.
    pub fn into_stored(self) -> Option<StoredAttendance> {
        let student = self.students?;
        Some(StoredAttendance {
            participant: Participant {
                key: self.student_id,
                external_id: student.student_id,
                name: student.student_name,
            },
            status: self.status,
            distance_meters: self.distance,
            latitude: self.latitude,
            longitude: self.longitude,
            submitted_at: self
                .submitted_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryRow {
    pub group_id: SessionId,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    pub submitted_at: Option<String>,
    pub groups: Option<EmbeddedGroup>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddedGroup {
    #[serde(default)]
    pub name: String,
}

impl From<HistoryRow> for AttendanceHistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            session_id: row.group_id,
            session_name: row
                .groups
                .map(|g| g.name)
                .unwrap_or_else(|| "N/A".to_string()),
            status: row.status,
            distance_meters: row.distance,
            latitude: row.latitude,
            longitude: row.longitude,
            submitted_at: row
                .submitted_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
        }
    }
}

/// Format a window timestamp for the store.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(WINDOW_TIME_FORMAT).to_string()
}

/// Parse a timestamp column. Accepts RFC 3339 and zone-less forms, the
/// latter read as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Total row count from a `Content-Range: 0-99/250` header.
pub(crate) fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}
