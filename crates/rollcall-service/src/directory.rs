//! Participant directory.

use std::sync::Arc;

use tracing::info;

use rollcall_cache::{CacheStatus, DirectoryView};
use rollcall_core::result::AppResult;
use rollcall_core::types::{NewParticipant, PageRequest, Participant, ParticipantId, ParticipantPage};

use crate::context::ServiceContext;
use crate::dto::{RegisterParticipantRequest, validate_request};

#[derive(Debug, Clone)]
pub struct DirectoryService {
    context: Arc<ServiceContext>,
}

impl DirectoryService {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self { context }
    }

    /// A page of the directory. The first page is served from cache while
    /// fresh; later pages always go to the store.
    pub async fn list(
        &self,
        page: PageRequest,
        force_refresh: bool,
    ) -> AppResult<(ParticipantPage, CacheStatus)> {
        let store = self.context.store.clone();
        match DirectoryView::for_request(&page) {
            Some(view) => {
                self.context
                    .caches
                    .directory
                    .get_or_load(view, force_refresh, async move {
                        store.list_participants(page).await
                    })
                    .await
            }
            None => Ok((store.list_participants(page).await?, CacheStatus::Miss)),
        }
    }

    /// Add a participant. Duplicate ids are a conflict.
    pub async fn register(&self, req: RegisterParticipantRequest) -> AppResult<Participant> {
        validate_request(&req)?;
        let participant = self
            .context
            .store
            .create_participant(NewParticipant {
                external_id: ParticipantId::new(&req.participant_id),
                name: req.name.trim().to_string(),
            })
            .await?;
        self.context.caches.directory.invalidate_all();
        info!(participant = %participant.external_id, "Participant registered");
        Ok(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::fixture;
    use rollcall_core::ErrorKind;
    use rollcall_core::config::session::MembershipFailurePolicy;

    fn register(id: &str) -> RegisterParticipantRequest {
        RegisterParticipantRequest {
            participant_id: id.into(),
            name: format!("Name {id}"),
        }
    }

    #[tokio::test]
    async fn test_first_page_cached_and_invalidated_on_register() {
        let fx = fixture(MembershipFailurePolicy::Deny);
        let service = DirectoryService::new(fx.context.clone());
        service.register(register("S1")).await.expect("register");

        let (page, status) = service.list(PageRequest::default(), false).await.expect("list");
        assert_eq!((page.total, status), (1, CacheStatus::Miss));
        let calls = fx.store.call_count();
        let (_, status) = service.list(PageRequest::default(), false).await.expect("list");
        assert_eq!(status, CacheStatus::Hit);
        assert_eq!(fx.store.call_count(), calls);

        service.register(register("S2")).await.expect("register");
        let (page, status) = service.list(PageRequest::default(), false).await.expect("list");
        assert_eq!((page.total, status), (2, CacheStatus::Miss));
    }

    #[tokio::test]
    async fn test_later_pages_bypass_cache() {
        let fx = fixture(MembershipFailurePolicy::Deny);
        let service = DirectoryService::new(fx.context.clone());
        for id in ["S1", "S2", "S3"] {
            service.register(register(id)).await.expect("register");
        }
        let (page, status) = service.list(PageRequest::new(2, 2), false).await.expect("list");
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let fx = fixture(MembershipFailurePolicy::Deny);
        let service = DirectoryService::new(fx.context.clone());
        service.register(register("S1")).await.expect("register");
        let err = service.register(register(" S1 ")).await.expect_err("duplicate");
        assert_eq!(err.kind, ErrorKind::Conflict);
    }
}
