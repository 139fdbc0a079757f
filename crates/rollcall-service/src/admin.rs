//! Session administration: lifecycle, geofence, roster, and listings.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use rollcall_cache::CacheStatus;
use rollcall_core::error::AppError;
use rollcall_core::result::AppResult;
use rollcall_core::types::{
    AdminId, NewSession, Participant, ParticipantId, SessionId, SessionPatch, SessionSummary,
    StoredSession,
};
use rollcall_session::CenterInfo;

use crate::context::ServiceContext;
use crate::dto::{
    AddMembersRequest, CreateSessionRequest, MembersAdded, RenameSessionRequest,
    SetCenterRequest, validate_request,
};

/// Admin-facing session operations.
#[derive(Debug, Clone)]
pub struct SessionAdminService {
    context: Arc<ServiceContext>,
}

impl SessionAdminService {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self { context }
    }

    /// Create a session in the store and register it in memory.
    pub async fn create_session(&self, req: CreateSessionRequest) -> AppResult<StoredSession> {
        validate_request(&req)?;
        let stored = self
            .context
            .store
            .create_session(NewSession {
                name: req.name.trim().to_string(),
                admin_id: req.admin_id,
            })
            .await?;

        let session = self.context.registry.get_or_create(stored.id);
        session.apply_metadata(&stored).await;
        self.context.caches.listings.invalidate(&req.admin_id).await;

        info!(session_id = %stored.id, admin_id = %req.admin_id, "Session created");
        Ok(stored)
    }

    /// Delete a session from the store, then drop it from memory.
    pub async fn delete_session(&self, id: SessionId) -> AppResult<()> {
        self.context.store.delete_session(id).await?;
        self.context.registry.delete(id).await;
        self.context.caches.listings.invalidate_all();
        info!(session_id = %id, "Session deleted");
        Ok(())
    }

    pub async fn rename_session(&self, id: SessionId, req: RenameSessionRequest) -> AppResult<()> {
        validate_request(&req)?;
        let name = req.name.trim().to_string();
        let session = self.context.session(id).await;
        session.rename(name.clone()).await;
        self.context.persist(
            id,
            SessionPatch {
                name: Some(name),
                ..Default::default()
            },
        );
        match session.admin_id().await {
            Some(admin) => self.context.caches.listings.invalidate(&admin).await,
            None => self.context.caches.listings.invalidate_all(),
        }
        Ok(())
    }

    /// Set the geofence. The change applies immediately in memory and is
    /// persisted in the background.
    pub async fn set_center(&self, id: SessionId, req: SetCenterRequest) -> AppResult<CenterInfo> {
        validate_request(&req)?;
        let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(String::from);
        let session = self.context.session(id).await;
        session
            .set_center(req.center(), req.threshold_meters, name.clone())
            .await;
        self.context.persist(
            id,
            SessionPatch {
                name,
                center_lat: Some(req.latitude),
                center_lon: Some(req.longitude),
                threshold_meters: Some(req.threshold_meters),
                ..Default::default()
            },
        );
        Ok(session.center_info().await)
    }

    /// Center, threshold, and name; read from the store when the session is
    /// not loaded.
    pub async fn center_info(&self, id: SessionId) -> AppResult<CenterInfo> {
        let session = self.context.existing_session(id).await?;
        Ok(session.center_info().await)
    }

    /// Add participants to the roster by external id. Nothing is added
    /// unless every id resolves.
    pub async fn add_members(&self, id: SessionId, req: AddMembersRequest) -> AppResult<MembersAdded> {
        validate_request(&req)?;
        let wanted: Vec<ParticipantId> = req
            .participant_ids
            .iter()
            .map(ParticipantId::new)
            .filter(|p| !p.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if wanted.is_empty() {
            return Err(AppError::validation("At least one participant id is required"));
        }

        let resolved = self.context.store.resolve_participants(&wanted).await?;
        let missing: Vec<&str> = wanted
            .iter()
            .filter(|p| !resolved.contains_key(*p))
            .map(ParticipantId::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::validation(format!(
                "Unknown participant ids: {}",
                missing.join(", ")
            )));
        }

        let keys: Vec<_> = wanted.iter().map(|p| resolved[p]).collect();
        self.context.store.add_members(id, &keys).await?;
        info!(session_id = %id, count = keys.len(), "Members added");
        Ok(MembersAdded {
            session_id: id,
            added: keys.len(),
        })
    }

    pub async fn list_members(&self, id: SessionId) -> AppResult<Vec<Participant>> {
        self.context.store.list_members(id).await
    }

    /// An admin's sessions, served from cache while fresh.
    pub async fn list_admin_sessions(
        &self,
        admin_id: AdminId,
        force_refresh: bool,
    ) -> AppResult<(Vec<SessionSummary>, CacheStatus)> {
        let store = self.context.store.clone();
        self.context
            .caches
            .listings
            .get_or_load(admin_id, force_refresh, async move {
                store.list_sessions_for_admin(admin_id).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::fixture;
    use rollcall_core::ErrorKind;
    use rollcall_core::config::session::MembershipFailurePolicy;
    use rollcall_core::traits::AttendanceStore;
    use rollcall_core::types::NewParticipant;

    fn create(admin: AdminId, name: &str) -> CreateSessionRequest {
        CreateSessionRequest {
            name: name.into(),
            admin_id: admin,
        }
    }

    #[tokio::test]
    async fn test_listing_is_cached_until_create_invalidates() {
        let fx = fixture(MembershipFailurePolicy::Deny);
        let service = SessionAdminService::new(fx.context.clone());
        let admin = AdminId::new();

        service.create_session(create(admin, "Lab A")).await.expect("create");
        let (first, status) = service.list_admin_sessions(admin, false).await.expect("list");
        assert_eq!((first.len(), status), (1, CacheStatus::Miss));
        let (_, status) = service.list_admin_sessions(admin, false).await.expect("list");
        assert_eq!(status, CacheStatus::Hit);

        service.create_session(create(admin, "Lab B")).await.expect("create");
        let (second, status) = service.list_admin_sessions(admin, false).await.expect("list");
        assert_eq!((second.len(), status), (2, CacheStatus::Miss));
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let fx = fixture(MembershipFailurePolicy::Deny);
        let service = SessionAdminService::new(fx.context.clone());
        let admin = AdminId::new();
        service.list_admin_sessions(admin, false).await.expect("warm");
        let (_, status) = service.list_admin_sessions(admin, true).await.expect("refresh");
        assert_eq!(status, CacheStatus::Miss);
    }

    #[tokio::test]
    async fn test_delete_removes_live_session() {
        let fx = fixture(MembershipFailurePolicy::Deny);
        let service = SessionAdminService::new(fx.context.clone());
        let stored = service
            .create_session(create(AdminId::new(), "Lab"))
            .await
            .expect("create");
        assert!(fx.context.registry.contains(stored.id));

        service.delete_session(stored.id).await.expect("delete");
        assert!(!fx.context.registry.contains(stored.id));
        let err = service.center_info(stored.id).await.expect_err("gone");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_set_center_updates_live_state() {
        let fx = fixture(MembershipFailurePolicy::Deny);
        let service = SessionAdminService::new(fx.context.clone());
        let id = SessionId::new();
        let info = service
            .set_center(
                id,
                SetCenterRequest {
                    latitude: 1.0,
                    longitude: 1.0,
                    threshold_meters: 50.0,
                    name: Some("  Field trip ".into()),
                },
            )
            .await
            .expect("set");
        assert_eq!(info.center, Some(rollcall_core::types::GeoPoint::new(1.0, 1.0)));
        assert_eq!(info.threshold_meters, 50.0);
        assert_eq!(info.name, "Field trip");
        assert!(!info.window_active);
    }

    #[tokio::test]
    async fn test_add_members_is_all_or_nothing() {
        let fx = fixture(MembershipFailurePolicy::Deny);
        let service = SessionAdminService::new(fx.context.clone());
        let stored = service
            .create_session(create(AdminId::new(), "Lab"))
            .await
            .expect("create");
        fx.store
            .create_participant(NewParticipant {
                external_id: ParticipantId::new("S1"),
                name: "Ada".into(),
            })
            .await
            .expect("participant");

        let err = service
            .add_members(
                stored.id,
                AddMembersRequest {
                    participant_ids: vec!["S1".into(), "S404".into()],
                },
            )
            .await
            .expect_err("unknown id");
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("S404"));
        assert!(service.list_members(stored.id).await.expect("list").is_empty());

        let added = service
            .add_members(
                stored.id,
                AddMembersRequest {
                    participant_ids: vec!["S1".into(), " S1 ".into()],
                },
            )
            .await
            .expect("add");
        assert_eq!(added.added, 1);
        assert_eq!(service.list_members(stored.id).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_blank_name_rejected_without_store_call() {
        let fx = fixture(MembershipFailurePolicy::Deny);
        let service = SessionAdminService::new(fx.context.clone());
        let err = service
            .create_session(create(AdminId::new(), "  "))
            .await
            .expect_err("blank");
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(fx.store.call_count(), 0);
    }
}
