//! Remote attendance store configuration.

use serde::{Deserialize, Serialize};

/// Which [`AttendanceStore`](crate::traits::AttendanceStore) adapter to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// PostgREST-compatible HTTP endpoint.
    #[default]
    Rest,
    /// Process-local store; nothing survives a restart.
    Memory,
}

/// Remote store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store adapter.
    #[serde(default)]
    pub backend: StoreBackend,
    /// Base URL of the project, without the `/rest/v1` suffix.
    #[serde(default)]
    pub url: String,
    /// API key sent as both `apikey` and bearer token.
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: String::new(),
            api_key: String::new(),
            request_timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}
