//! Bounded, non-blocking job queue.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{trace, warn};

use crate::jobs::SyncJob;

/// Sending half of the sync queue.
///
/// Enqueueing never waits: when the queue is full or the runner is gone,
/// the job is dropped with a warning.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    sender: Option<mpsc::Sender<SyncJob>>,
}

impl SyncQueue {
    /// Create a queue and the receiver a [`SyncRunner`](crate::SyncRunner) consumes.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SyncJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A queue that discards every job, for when syncing is disabled.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Offer a job. Returns whether it was queued.
    pub fn enqueue(&self, job: SyncJob) -> bool {
        let Some(sender) = &self.sender else {
            trace!(kind = job.kind(), "Sync disabled; job discarded");
            return false;
        };
        match sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(
                    kind = job.kind(),
                    session_id = %job.session_id(),
                    "Sync queue full; job dropped"
                );
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!(
                    kind = job.kind(),
                    session_id = %job.session_id(),
                    "Sync runner stopped; job dropped"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::types::{SessionId, SessionPatch};

    fn job() -> SyncJob {
        SyncJob::UpdateSession {
            session_id: SessionId::new(),
            patch: SessionPatch::default(),
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let (queue, _rx) = SyncQueue::channel(1);
        assert!(queue.enqueue(job()));
        assert!(!queue.enqueue(job()));
    }

    #[tokio::test]
    async fn test_closed_queue_drops() {
        let (queue, rx) = SyncQueue::channel(4);
        drop(rx);
        assert!(!queue.enqueue(job()));
    }

    #[test]
    fn test_disabled_queue_discards() {
        assert!(!SyncQueue::disabled().enqueue(job()));
    }
}
