//! Read-through cache configuration.

use serde::{Deserialize, Serialize};

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache of the sessions owned by each admin.
    #[serde(default = "default_listing")]
    pub listing: CacheTierConfig,
    /// Cache of the participant directory's list view.
    #[serde(default = "default_directory")]
    pub directory: CacheTierConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing: default_listing(),
            directory: default_directory(),
        }
    }
}

/// Settings for one cache instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTierConfig {
    /// Entries older than this are treated as absent.
    pub freshness_seconds: u64,
    /// Maximum number of entries held.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

fn default_listing() -> CacheTierConfig {
    CacheTierConfig {
        freshness_seconds: 300,
        max_capacity: default_max_capacity(),
    }
}

fn default_directory() -> CacheTierConfig {
    CacheTierConfig {
        freshness_seconds: 10,
        max_capacity: 64,
    }
}

fn default_max_capacity() -> u64 {
    10000
}
