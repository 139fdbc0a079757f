//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! `config/default.toml`, an environment overlay, and `ROLLCALL__*`
//! environment variables. Every field carries a default so the process can
//! start with no configuration files at all.

pub mod audit;
pub mod cache;
pub mod logging;
pub mod session;
pub mod store;
pub mod worker;

use serde::{Deserialize, Serialize};

use self::audit::AuditConfig;
use self::cache::CacheConfig;
use self::logging::LoggingConfig;
use self::session::SessionConfig;
use self::store::StoreConfig;
use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote attendance store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Attendance window and submission policy settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Audit log settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Read-through cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Background sync worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `ROLLCALL__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ROLLCALL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
