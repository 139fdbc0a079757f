//! Cache key types.

use rollcall_core::types::PageRequest;

/// Key of the participant directory cache.
///
/// Only the first page of the plain list view is cached, so the page size
/// is the only thing that varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectoryView {
    pub limit: u64,
}

impl DirectoryView {
    /// The cache key for a listing request, or `None` if the request is
    /// not cacheable (any page other than the first).
    pub fn for_request(page: &PageRequest) -> Option<Self> {
        (page.page == 1).then_some(Self { limit: page.limit })
    }
}
