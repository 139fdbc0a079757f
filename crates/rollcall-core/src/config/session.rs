//! Attendance window and submission policy configuration.

use serde::{Deserialize, Serialize};

/// Attendance window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Length of an attendance window in seconds.
    #[serde(default = "default_window_duration")]
    pub window_duration_seconds: u64,
    /// What to do when the roster membership check cannot reach the store.
    #[serde(default)]
    pub membership_failure_policy: MembershipFailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_duration_seconds: default_window_duration(),
            membership_failure_policy: MembershipFailurePolicy::default(),
        }
    }
}

/// Outcome applied to a members-only submission when the membership
/// lookup itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipFailurePolicy {
    /// Reject the submission as unverifiable.
    #[default]
    Deny,
    /// Accept the submission as if membership had been confirmed.
    Allow,
}

fn default_window_duration() -> u64 {
    600
}
