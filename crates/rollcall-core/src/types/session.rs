//! Session records as held by the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;
use super::id::{AdminId, SessionId};

/// Persisted lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, no window running.
    #[default]
    Inactive,
    /// A window was started and not yet closed.
    Active,
    /// The last window was closed by the admin.
    Closed,
}

impl SessionStatus {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

/// Who may submit during a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    /// Anyone with the session id.
    #[default]
    OpenToAll,
    /// Only participants on the session's roster.
    MembersOnly,
}

impl ScopeMode {
    /// Map the admin's "group only" toggle.
    pub fn from_members_only(members_only: bool) -> Self {
        if members_only {
            Self::MembersOnly
        } else {
            Self::OpenToAll
        }
    }
}

/// Full session row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: SessionId,
    pub name: String,
    pub admin_id: Option<AdminId>,
    pub status: SessionStatus,
    pub center_lat: Option<f64>,
    pub center_lon: Option<f64>,
    pub threshold_meters: Option<f64>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    /// Scope of the last started window; `None` when never recorded.
    pub members_only: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    /// The configured center, if both coordinates are present and not `(0, 0)`.
    pub fn center(&self) -> Option<GeoPoint> {
        match (self.center_lat, self.center_lon) {
            (Some(lat), Some(lon)) => {
                let point = GeoPoint::new(lat, lon);
                (!point.is_unset()).then_some(point)
            }
            _ => None,
        }
    }

    /// Scope of the recorded window. An unrecorded scope reads as
    /// members-only so a restored window never widens who may submit.
    pub fn scope(&self) -> ScopeMode {
        self.members_only
            .map_or(ScopeMode::MembersOnly, ScopeMode::from_members_only)
    }

    /// Listing view of this row.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Row shape returned when listing an admin's sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub status: SessionStatus,
    pub created_at: Option<DateTime<Utc>>,
}

/// Data for creating a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub name: String,
    pub admin_id: AdminId,
}

/// Partial update of a session row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members_only: Option<bool>,
}

impl SessionPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to a full row.
    pub fn apply_to(&self, session: &mut StoredSession) {
        if let Some(name) = &self.name {
            session.name = name.clone();
        }
        if let Some(status) = self.status {
            session.status = status;
        }
        if self.center_lat.is_some() {
            session.center_lat = self.center_lat;
        }
        if self.center_lon.is_some() {
            session.center_lon = self.center_lon;
        }
        if self.threshold_meters.is_some() {
            session.threshold_meters = self.threshold_meters;
        }
        if self.window_start.is_some() {
            session.window_start = self.window_start;
        }
        if self.window_end.is_some() {
            session.window_end = self.window_end;
        }
        if self.members_only.is_some() {
            session.members_only = self.members_only;
        }
    }
}
