//! Applies a [`SyncJob`] to the store.

use std::sync::Arc;

use rollcall_core::error::{AppError, ErrorKind};
use rollcall_core::traits::AttendanceStore;
use rollcall_core::types::AttendanceRecord;

use crate::jobs::SyncJob;

/// Error from job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure: do not retry.
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure: may retry.
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Sort a store error into retryable or not.
    fn classify(err: AppError) -> Self {
        match err.kind {
            ErrorKind::ExternalService | ErrorKind::ServiceUnavailable => {
                Self::Transient(err.to_string())
            }
            ErrorKind::NotFound | ErrorKind::Validation | ErrorKind::Conflict => {
                Self::Permanent(err.to_string())
            }
            _ => Self::Internal(err),
        }
    }
}

/// Executes jobs against an [`AttendanceStore`].
#[derive(Debug, Clone)]
pub struct SyncExecutor {
    store: Arc<dyn AttendanceStore>,
}

impl SyncExecutor {
    pub fn new(store: Arc<dyn AttendanceStore>) -> Self {
        Self { store }
    }

    /// Run one job once.
    pub async fn execute(&self, job: &SyncJob) -> Result<(), JobExecutionError> {
        match job {
            SyncJob::UpdateSession { session_id, patch } => self
                .store
                .update_session(*session_id, patch)
                .await
                .map_err(JobExecutionError::classify),
            SyncJob::RecordAttendance {
                session_id,
                participant_id,
                status,
                distance_meters,
                latitude,
                longitude,
                submitted_at,
            } => {
                let resolved = self
                    .store
                    .resolve_participants(std::slice::from_ref(participant_id))
                    .await
                    .map_err(JobExecutionError::classify)?;
                let participant_key = resolved.get(participant_id).copied().ok_or_else(|| {
                    JobExecutionError::Permanent(format!(
                        "Participant '{participant_id}' is not registered"
                    ))
                })?;
                let record = AttendanceRecord {
                    session_id: *session_id,
                    participant_key,
                    status: *status,
                    distance_meters: *distance_meters,
                    latitude: *latitude,
                    longitude: *longitude,
                    submitted_at: *submitted_at,
                };
                self.store
                    .record_attendance(&record)
                    .await
                    .map_err(JobExecutionError::classify)
            }
        }
    }
}
