//! Background sync worker configuration.

use serde::{Deserialize, Serialize};

/// Settings for the queue that carries best-effort writes to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the sync runner is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of jobs that may wait in the queue before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Attempts per job before it is abandoned.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds, multiplied by the attempt number.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// How long shutdown waits for queued jobs to drain, in seconds.
    #[serde(default = "default_drain_timeout")]
    pub shutdown_drain_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            shutdown_drain_seconds: default_drain_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    250
}

fn default_drain_timeout() -> u64 {
    5
}
