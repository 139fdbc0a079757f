//! Attendance window control and status.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::warn;

use rollcall_core::result::AppResult;
use rollcall_core::types::{ParticipantId, ScopeMode, SessionId, SessionPatch, SessionStatus};
use rollcall_session::{WindowStarted, WindowStatus};

use crate::context::ServiceContext;
use crate::dto::StartWindowRequest;

#[derive(Debug, Clone)]
pub struct WindowService {
    context: Arc<ServiceContext>,
}

impl WindowService {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self { context }
    }

    /// Start or restart the window. Clears the previous window's
    /// submissions.
    pub async fn start_window(&self, id: SessionId, req: StartWindowRequest) -> AppResult<WindowStarted> {
        let session = self.context.session(id).await;
        let started = session.start_window(req.scope()).await;
        self.context.persist(
            id,
            SessionPatch {
                status: Some(SessionStatus::Active),
                window_start: Some(started.started_at),
                window_end: Some(started.ends_at),
                members_only: Some(started.scope == ScopeMode::MembersOnly),
                ..Default::default()
            },
        );
        Ok(started)
    }

    /// Close the window. Returns whether it was active; closing twice is
    /// not an error.
    pub async fn close_window(&self, id: SessionId) -> AppResult<bool> {
        let session = self.context.existing_session(id).await?;
        let was_active = session.close_window().await;
        self.context.persist(
            id,
            SessionPatch {
                status: Some(SessionStatus::Closed),
                ..Default::default()
            },
        );
        Ok(was_active)
    }

    pub async fn window_status(&self, id: SessionId) -> AppResult<WindowStatus> {
        let session = self.context.existing_session(id).await?;
        Ok(session.window_status().await)
    }

    /// The open window this participant may submit to with the most time
    /// left: any open-to-all window, or a members-only window of a session
    /// whose roster includes them.
    pub async fn participant_status(&self, participant_id: &str) -> AppResult<Option<WindowStatus>> {
        let participant = ParticipantId::new(participant_id);
        let memberships = self.memberships(&participant).await;

        for id in &memberships {
            if !self.context.registry.contains(*id) {
                if let Err(e) = self.context.existing_session(*id).await {
                    warn!(session_id = %id, error = %e, "Could not load member session");
                }
            }
        }

        let sessions = self.context.registry.sessions();
        let statuses = join_all(sessions.iter().map(|s| s.window_status())).await;
        Ok(statuses
            .into_iter()
            .filter(|status| status.active)
            .filter(|status| {
                status.scope == ScopeMode::OpenToAll || memberships.contains(&status.session_id)
            })
            .max_by_key(|status| status.remaining_seconds))
    }

    /// Sessions whose roster lists the participant. Lookup failures are
    /// logged and treated as no memberships.
    async fn memberships(&self, participant: &ParticipantId) -> HashSet<SessionId> {
        if participant.is_empty() {
            return HashSet::new();
        }
        let store = &self.context.store;
        let key = match store.resolve_participants(std::slice::from_ref(participant)).await {
            Ok(resolved) => match resolved.get(participant) {
                Some(key) => *key,
                None => return HashSet::new(),
            },
            Err(e) => {
                warn!(participant = %participant, error = %e, "Participant lookup failed");
                return HashSet::new();
            }
        };
        match store.sessions_of_participant(key).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!(participant = %participant, error = %e, "Membership lookup failed");
                HashSet::new()
            }
        }
    }
}
