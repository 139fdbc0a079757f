//! Worker runner: the sync queue's single consumer.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use rollcall_core::config::worker::WorkerConfig;

use crate::executor::{JobExecutionError, SyncExecutor};
use crate::jobs::SyncJob;

/// Outcome counts from a [`SyncRunner::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Consumes [`SyncJob`]s one at a time, in enqueue order.
#[derive(Debug)]
pub struct SyncRunner {
    executor: SyncExecutor,
    receiver: mpsc::Receiver<SyncJob>,
    max_attempts: u32,
    retry_backoff: Duration,
    shutdown_drain: Duration,
}

impl SyncRunner {
    pub fn new(
        executor: SyncExecutor,
        receiver: mpsc::Receiver<SyncJob>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            executor,
            receiver,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            shutdown_drain: Duration::from_secs(config.shutdown_drain_seconds),
        }
    }

    /// Run until `cancel` flips to `true` or every sender is dropped.
    ///
    /// On cancellation the jobs already queued are applied for up to the
    /// configured drain period; whatever remains is dropped and counted.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        info!(max_attempts = self.max_attempts, "Sync runner started");

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                job = self.receiver.recv() => {
                    match job {
                        Some(job) => {
                            self.process(job).await;
                        }
                        None => {
                            info!("Sync queue closed; runner stopping");
                            return;
                        }
                    }
                }
            }
        }

        self.receiver.close();
        let outcome = tokio::time::timeout(self.shutdown_drain, self.drain()).await;
        match outcome {
            Ok(report) => info!(
                succeeded = report.succeeded,
                failed = report.failed,
                "Sync runner drained queue on shutdown"
            ),
            Err(_) => warn!(
                abandoned = self.receiver.len(),
                "Sync drain timed out; remaining jobs dropped"
            ),
        }
        info!("Sync runner stopped");
    }

    /// Apply every job currently queued, then return.
    pub async fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        while let Ok(job) = self.receiver.try_recv() {
            if self.process(job).await {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }
        report
    }

    /// Execute one job with bounded retries. Returns whether it was applied.
    async fn process(&self, job: SyncJob) -> bool {
        let kind = job.kind();
        let session_id = job.session_id();

        for attempt in 1..=self.max_attempts {
            match self.executor.execute(&job).await {
                Ok(()) => {
                    debug!(kind, %session_id, attempt, "Sync job applied");
                    return true;
                }
                Err(JobExecutionError::Transient(message)) if attempt < self.max_attempts => {
                    warn!(kind, %session_id, attempt, error = %message, "Sync job failed; retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(JobExecutionError::Transient(message)) => {
                    error!(kind, %session_id, attempt, error = %message, "Sync job gave up after retries");
                    return false;
                }
                Err(JobExecutionError::Permanent(message)) => {
                    error!(kind, %session_id, error = %message, "Sync job rejected");
                    return false;
                }
                Err(JobExecutionError::Internal(err)) => {
                    error!(kind, %session_id, error = %err, "Sync job hit an internal error");
                    return false;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use rollcall_core::traits::AttendanceStore;
    use rollcall_core::types::{
        AdminId, AttendanceStatus, NewParticipant, NewSession, ParticipantId, SessionPatch,
        SessionStatus,
    };
    use rollcall_store::memory::MemoryStore;

    use crate::queue::SyncQueue;

    fn config() -> WorkerConfig {
        WorkerConfig {
            enabled: true,
            queue_capacity: 16,
            max_attempts: 3,
            retry_backoff_ms: 10,
            shutdown_drain_seconds: 1,
        }
    }

    fn runner(store: Arc<MemoryStore>) -> (SyncQueue, SyncRunner) {
        let (queue, rx) = SyncQueue::channel(16);
        let runner = SyncRunner::new(SyncExecutor::new(store), rx, &config());
        (queue, runner)
    }

    #[tokio::test]
    async fn test_jobs_apply_in_order() {
        let store = Arc::new(MemoryStore::default());
        let session = store
            .create_session(NewSession {
                name: "Lab".into(),
                admin_id: AdminId::new(),
            })
            .await
            .expect("create");
        let (queue, mut runner) = runner(store.clone());

        for name in ["First", "Second"] {
            queue.enqueue(SyncJob::UpdateSession {
                session_id: session.id,
                patch: SessionPatch {
                    name: Some(name.into()),
                    status: Some(SessionStatus::Active),
                    ..Default::default()
                },
            });
        }
        let report = runner.drain().await;
        assert_eq!(report, DrainReport { succeeded: 2, failed: 0 });

        let stored = store.fetch_session(session.id).await.expect("fetch").expect("exists");
        assert_eq!(stored.name, "Second");
        assert_eq!(stored.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_unknown_participant_is_not_retried() {
        let store = Arc::new(MemoryStore::default());
        let (queue, mut runner) = runner(store.clone());
        queue.enqueue(SyncJob::RecordAttendance {
            session_id: rollcall_core::types::SessionId::new(),
            participant_id: ParticipantId::new("ghost"),
            status: AttendanceStatus::Present,
            distance_meters: 3.0,
            latitude: 0.0,
            longitude: 0.0,
            submitted_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        });
        let before = store.call_count();
        let report = runner.drain().await;
        assert_eq!(report.failed, 1);
        assert_eq!(store.call_count() - before, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_outage_retries_then_gives_up() {
        let store = Arc::new(MemoryStore::default());
        store.set_unavailable(true);
        let (queue, mut runner) = runner(store.clone());
        queue.enqueue(SyncJob::UpdateSession {
            session_id: rollcall_core::types::SessionId::new(),
            patch: SessionPatch::default(),
        });
        let report = runner.drain().await;
        assert_eq!(report.failed, 1);
        assert_eq!(store.call_count(), 3);
    }

    #[tokio::test]
    async fn test_attendance_recorded_after_resolution() {
        let store = Arc::new(MemoryStore::default());
        let session = store
            .create_session(NewSession {
                name: "Lab".into(),
                admin_id: AdminId::new(),
            })
            .await
            .expect("session");
        let participant = store
            .create_participant(NewParticipant {
                external_id: ParticipantId::new("S1"),
                name: "Ada".into(),
            })
            .await
            .expect("participant");
        let (queue, mut runner) = runner(store.clone());
        queue.enqueue(SyncJob::RecordAttendance {
            session_id: session.id,
            participant_id: ParticipantId::new("S1"),
            status: AttendanceStatus::Present,
            distance_meters: 12.0,
            latitude: 1.0,
            longitude: 2.0,
            submitted_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        });
        assert_eq!(runner.drain().await.succeeded, 1);

        let rows = store.list_attendance(session.id).await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].participant.key, participant.key);
    }

    #[tokio::test]
    async fn test_run_drains_on_cancel() {
        let store = Arc::new(MemoryStore::default());
        let session = store
            .create_session(NewSession {
                name: "Lab".into(),
                admin_id: AdminId::new(),
            })
            .await
            .expect("session");
        let (queue, runner) = runner(store.clone());
        let (cancel_tx, cancel_rx) = watch::channel(false);

        queue.enqueue(SyncJob::UpdateSession {
            session_id: session.id,
            patch: SessionPatch {
                name: Some("Renamed".into()),
                ..Default::default()
            },
        });
        cancel_tx.send(true).expect("cancel");
        runner.run(cancel_rx).await;

        let stored = store.fetch_session(session.id).await.expect("fetch").expect("exists");
        assert_eq!(stored.name, "Renamed");
    }
}
