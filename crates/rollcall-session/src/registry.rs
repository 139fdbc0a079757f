//! Session registry: the single in-process authority for live sessions.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, info};

use rollcall_core::types::SessionId;

use crate::session::{Session, SessionRuntime};

/// Concurrent map of session id to live [`Session`].
///
/// The map's own locking covers only insertion and removal; everything
/// inside a session is guarded by that session's lock, so operations on
/// different sessions never contend.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    runtime: Arc<SessionRuntime>,
}

impl SessionRegistry {
    pub fn new(runtime: Arc<SessionRuntime>) -> Self {
        Self {
            sessions: DashMap::new(),
            runtime,
        }
    }

    pub fn runtime(&self) -> &Arc<SessionRuntime> {
        &self.runtime
    }

    /// Return the session for `id`, creating it if absent.
    ///
    /// Concurrent first calls for the same id all receive the same
    /// instance: a shared-lock lookup is tried first, then the shard's
    /// exclusive entry lock decides who inserts.
    pub fn get_or_create(&self, id: SessionId) -> Arc<Session> {
        if let Some(existing) = self.sessions.get(&id) {
            return existing.value().clone();
        }
        self.sessions
            .entry(id)
            .or_insert_with(|| {
                debug!(session_id = %id, "Session created in registry");
                Arc::new(Session::new(id, self.runtime.clone()))
            })
            .value()
            .clone()
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|s| s.value().clone())
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Remove a session and close its audit log. Operations already
    /// holding the session finish against the detached instance.
    pub async fn delete(&self, id: SessionId) -> bool {
        match self.sessions.remove(&id) {
            Some((_, session)) => {
                session.shutdown().await;
                info!(session_id = %id, "Session removed from registry");
                true
            }
            None => false,
        }
    }

    /// Snapshot of every live session.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|s| s.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close every session's timer and audit log. Entries stay registered.
    pub async fn close_all(&self) {
        let sessions = self.sessions();
        let count = sessions.len();
        join_all(sessions.iter().map(|s| s.shutdown())).await;
        info!(count, "All session audit logs closed");
    }
}
