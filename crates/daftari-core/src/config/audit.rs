//! Audit logging configuration.

use serde::{Deserialize, Serialize};

/// Configuration for audit logging of guard decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Also echo events to the console as human-readable lines.
    #[serde(default)]
    pub stdout: bool,

    /// Directory holding `audit.log` (JSON Lines).
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Whether to record secured queries.
    #[serde(default = "default_enabled")]
    pub log_secured: bool,

    /// Whether to record rejected queries (with the raw SQL).
    #[serde(default = "default_enabled")]
    pub log_rejected: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            stdout: false,
            directory: default_directory(),
            log_secured: default_enabled(),
            log_rejected: default_enabled(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_directory() -> String {
    "logs".to_string()
}
