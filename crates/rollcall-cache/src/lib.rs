//! # rollcall-cache
//!
//! In-process caches that shield the remote store from repeated list
//! queries. Caches are never the source of truth: every entry expires
//! after a fixed freshness window and writes invalidate eagerly.

pub mod keys;
pub mod provider;
pub mod read_through;

pub use keys::DirectoryView;
pub use provider::CacheSet;
pub use read_through::{CacheStatus, ReadThroughCache};
