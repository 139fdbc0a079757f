//! Attendance window state machine.
//!
//! `Idle` until first started, `Active` while `now < ends_at` and not
//! explicitly closed, `Closed` otherwise. Expiry is observed lazily: the
//! first reader to notice `now >= ends_at` flips the flag. Start and end
//! times survive a close so status queries can still report them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use rollcall_core::types::ScopeMode;

/// Observable window phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowPhase {
    Idle,
    Active,
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct WindowState {
    active: bool,
    started_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    scope: ScopeMode,
    /// Incremented on every start so that a stale timer can be told apart
    /// from the current one.
    epoch: u64,
}

impl WindowState {
    /// Begin a new window, replacing any current one. Returns the new epoch.
    pub fn start(&mut self, now: DateTime<Utc>, duration: Duration, scope: ScopeMode) -> u64 {
        self.active = true;
        self.started_at = Some(now);
        self.ends_at = Some(now + duration);
        self.scope = scope;
        self.epoch += 1;
        self.epoch
    }

    /// Reinstate a window known from persistent storage.
    pub fn restore(
        &mut self,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        scope: ScopeMode,
        now: DateTime<Utc>,
    ) -> u64 {
        self.started_at = Some(started_at);
        self.ends_at = Some(ends_at);
        self.scope = scope;
        self.active = now < ends_at;
        self.epoch += 1;
        self.epoch
    }

    /// Explicit close. Returns whether the window was active.
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    /// Timer-driven close; ignored unless `epoch` is the current window.
    pub fn expire_epoch(&mut self, epoch: u64) -> bool {
        if self.epoch != epoch {
            return false;
        }
        self.close()
    }

    /// Whether a lazy flip is pending.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.ends_at.is_some_and(|end| now >= end)
    }

    /// Perform the lazy flip if due. Returns whether it flipped.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_due(now) {
            self.active = false;
            true
        } else {
            false
        }
    }

    /// Whether submissions are accepted at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.ends_at.is_some_and(|end| now < end)
    }

    pub fn phase(&self, now: DateTime<Utc>) -> WindowPhase {
        if self.started_at.is_none() {
            WindowPhase::Idle
        } else if self.is_open_at(now) {
            WindowPhase::Active
        } else {
            WindowPhase::Closed
        }
    }

    /// Whole seconds left, zero unless open.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        match self.ends_at {
            Some(end) if self.is_open_at(now) => (end - now).num_seconds().max(0) as u64,
            _ => 0,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }

    pub fn scope(&self) -> ScopeMode {
        self.scope
    }

    /// Identifies the current window; changes on every start or restore.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
