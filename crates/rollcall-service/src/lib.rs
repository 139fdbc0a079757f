//! # rollcall-service
//!
//! Use-case layer sitting between an (external) request layer and the
//! in-process session registry. Each service resolves sessions through a
//! shared [`ServiceContext`], reads the remote store outside any session
//! lock, and hands durability writes to the sync queue.

pub mod admin;
pub mod context;
pub mod directory;
pub mod dto;
pub mod submission;
pub mod window;

use std::sync::Arc;

pub use admin::SessionAdminService;
pub use context::ServiceContext;
pub use directory::DirectoryService;
pub use submission::SubmissionService;
pub use window::WindowService;

/// All services over one shared context.
#[derive(Debug, Clone)]
pub struct Services {
    pub admin: SessionAdminService,
    pub windows: WindowService,
    pub submissions: SubmissionService,
    pub directory: DirectoryService,
}

impl Services {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self {
            admin: SessionAdminService::new(context.clone()),
            windows: WindowService::new(context.clone()),
            submissions: SubmissionService::new(context.clone()),
            directory: DirectoryService::new(context),
        }
    }
}
