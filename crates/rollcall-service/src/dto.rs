//! Request and response payloads.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use rollcall_core::error::AppError;
use rollcall_core::result::AppResult;
use rollcall_core::types::{AdminId, AttendanceStatus, GeoPoint, ParticipantId, ScopeMode, SessionId};
use rollcall_session::SubmissionRecord;

/// Run a DTO's validation rules, mapping failures to a validation error.
pub fn validate_request<T: Validate>(request: &T) -> AppResult<()> {
    request
        .validate()
        .map_err(|e| AppError::validation(format!("Invalid request: {e}")))
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn finite(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new("not_finite"));
    }
    Ok(())
}

/// Create a session owned by an admin.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(
        custom(function = "not_blank", message = "Session name is required"),
        length(max = 200)
    )]
    pub name: String,
    pub admin_id: AdminId,
}

/// Rename a session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RenameSessionRequest {
    #[validate(
        custom(function = "not_blank", message = "Session name is required"),
        length(max = 200)
    )]
    pub name: String,
}

/// Set the geofence center and threshold.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetCenterRequest {
    #[validate(custom(function = "finite"), range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(custom(function = "finite"), range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(custom(function = "finite"), range(min = 0.0))]
    pub threshold_meters: f64,
    /// Optional new display name.
    pub name: Option<String>,
}

impl SetCenterRequest {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Start (or restart) a window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartWindowRequest {
    #[serde(default)]
    pub members_only: bool,
}

impl StartWindowRequest {
    pub fn scope(&self) -> ScopeMode {
        ScopeMode::from_members_only(self.members_only)
    }
}

/// A participant's location report.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAttendanceRequest {
    #[validate(custom(function = "not_blank", message = "Participant id is required"))]
    pub participant_id: String,
    #[serde(default)]
    pub name: String,
    #[validate(custom(function = "finite"), range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(custom(function = "finite"), range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

/// Add participants to a session roster by external id.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddMembersRequest {
    #[validate(length(min = 1, message = "At least one participant id is required"))]
    pub participant_ids: Vec<String>,
}

/// Register a participant in the directory.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterParticipantRequest {
    #[validate(custom(function = "not_blank", message = "Participant id is required"))]
    pub participant_id: String,
    #[validate(custom(function = "not_blank", message = "Participant name is required"))]
    pub name: String,
}

/// Outcome of an accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub session_id: SessionId,
    pub participant_id: ParticipantId,
    pub status: AttendanceStatus,
    /// Distance rounded to whole meters.
    pub distance_meters: i64,
    pub submitted_at: DateTime<Utc>,
    /// `submitted_at` in server-local `YYYY-MM-DD HH:MM:SS`.
    pub submitted_at_local: String,
}

impl SubmissionReceipt {
    pub fn new(session_id: SessionId, record: &SubmissionRecord) -> Self {
        Self {
            session_id,
            participant_id: record.participant_id.clone(),
            status: record.status,
            distance_meters: record.distance_meters.round() as i64,
            submitted_at: record.submitted_at,
            submitted_at_local: record
                .submitted_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        }
    }
}

/// Result of adding members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembersAdded {
    pub session_id: SessionId,
    pub added: usize,
}
