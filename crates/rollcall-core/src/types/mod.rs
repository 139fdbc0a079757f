//! Core type definitions used across the Rollcall workspace.

pub mod attendance;
pub mod geo;
pub mod id;
pub mod pagination;
pub mod participant;
pub mod session;

pub use attendance::{AttendanceHistoryEntry, AttendanceRecord, AttendanceStatus, StoredAttendance};
pub use geo::GeoPoint;
pub use id::*;
pub use pagination::{PageRequest, PageResponse};
pub use participant::{NewParticipant, Participant, ParticipantPage};
pub use session::{NewSession, ScopeMode, SessionPatch, SessionStatus, SessionSummary, StoredSession};
