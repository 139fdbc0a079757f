//! Audit log configuration.

use serde::{Deserialize, Serialize};

/// Per-session audit log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Directory in which session audit files are created.
    #[serde(default = "default_directory")]
    pub directory: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
        }
    }
}

fn default_directory() -> String {
    "data/audit".to_string()
}
