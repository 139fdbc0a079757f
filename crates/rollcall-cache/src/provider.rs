//! The two cache instances used by the services.

use tracing::info;

use rollcall_core::config::cache::CacheConfig;
use rollcall_core::types::{AdminId, ParticipantPage, SessionSummary};

use crate::keys::DirectoryView;
use crate::read_through::ReadThroughCache;

/// Cache of an admin's session listing.
pub type ListingCache = ReadThroughCache<AdminId, Vec<SessionSummary>>;

/// Cache of the participant directory's first page.
pub type DirectoryCache = ReadThroughCache<DirectoryView, ParticipantPage>;

/// Both caches, built from configuration.
#[derive(Debug, Clone)]
pub struct CacheSet {
    pub listings: ListingCache,
    pub directory: DirectoryCache,
}

impl CacheSet {
    /// Build both caches.
    pub fn new(config: &CacheConfig) -> Self {
        info!(
            listing_freshness = config.listing.freshness_seconds,
            directory_freshness = config.directory.freshness_seconds,
            "Initializing read-through caches"
        );
        Self {
            listings: ReadThroughCache::from_config("session-listing", &config.listing),
            directory: ReadThroughCache::from_config("participant-directory", &config.directory),
        }
    }
}
