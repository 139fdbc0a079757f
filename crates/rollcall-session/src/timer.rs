//! Deferred forced expiry of an attendance window.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::session::Session;

/// A spawned task that closes one window epoch after a delay.
///
/// Dropping the timer aborts the task, so replacing a session's timer on
/// restart disarms the old one. The task only holds a weak reference and
/// does nothing if the session has been deleted.
#[derive(Debug)]
pub struct WindowTimer {
    handle: JoinHandle<()>,
}

impl WindowTimer {
    /// Arm a timer that expires `epoch` of `session` after `after`.
    pub fn arm(session: Weak<Session>, epoch: u64, after: Duration) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(session) = session.upgrade() {
                session.expire_window(epoch).await;
            } else {
                debug!(epoch, "Window timer fired for a deleted session");
            }
        });
        Self { handle }
    }

    /// Cancel the timer.
    pub fn disarm(&self) {
        self.handle.abort();
    }
}

impl Drop for WindowTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
