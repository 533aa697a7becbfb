//! Statement guard configuration.
//!
//! The allowlist, keyword blocklist and row limits applied to every
//! model-generated query.

use serde::{Deserialize, Serialize};

use super::{is_plain_identifier, ConfigError};

/// Settings for the statement guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Tables a query may reference in `FROM` / `JOIN`.
    #[serde(default = "default_allowed_tables")]
    pub allowed_tables: Vec<String>,

    /// Schemas a qualified table reference may name.
    #[serde(default = "default_allowed_schemas")]
    pub allowed_schemas: Vec<String>,

    /// Keywords that reject a statement wherever they appear as a word.
    #[serde(default = "default_blocked_keywords")]
    pub blocked_keywords: Vec<String>,

    /// Word prefixes that reject a statement (catalog introspection).
    #[serde(default = "default_blocked_prefixes")]
    pub blocked_prefixes: Vec<String>,

    /// Row cap appended when a query has no `LIMIT`.
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Largest `LIMIT` a secured query may carry.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,

    /// Clamp an explicit `LIMIT` above `max_limit` down to `max_limit`.
    #[serde(default = "default_true")]
    pub clamp_explicit_limit: bool,

    /// Re-parse the secured statement with a full SQL parser.
    #[serde(default)]
    pub strict_parse: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            allowed_tables: default_allowed_tables(),
            allowed_schemas: default_allowed_schemas(),
            blocked_keywords: default_blocked_keywords(),
            blocked_prefixes: default_blocked_prefixes(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            clamp_explicit_limit: true,
            strict_parse: false,
        }
    }
}

impl GuardConfig {
    /// Check whether a table name is on the allowlist (case-insensitive).
    pub fn is_table_allowed(&self, table: &str) -> bool {
        self.allowed_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(table))
    }

    /// Check whether a schema qualifier is allowed (case-insensitive).
    pub fn is_schema_allowed(&self, schema: &str) -> bool {
        self.allowed_schemas
            .iter()
            .any(|s| s.eq_ignore_ascii_case(schema))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_tables.is_empty() {
            return Err(ConfigError::Config(
                "guard.allowed_tables must list at least one table".to_string(),
            ));
        }
        if let Some(bad) = self.allowed_tables.iter().find(|t| !is_plain_identifier(t)) {
            return Err(ConfigError::Config(format!(
                "guard.allowed_tables entry '{bad}' is not a plain identifier"
            )));
        }
        if self.default_limit == 0 {
            return Err(ConfigError::Config(
                "guard.default_limit must be greater than zero".to_string(),
            ));
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::Config(format!(
                "guard.default_limit ({}) exceeds guard.max_limit ({})",
                self.default_limit, self.max_limit
            )));
        }
        Ok(())
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_limit() -> u64 {
    1000
}

fn default_max_limit() -> u64 {
    10000
}

fn default_allowed_tables() -> Vec<String> {
    ["inventories", "products", "sales", "expenses", "businesses"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_allowed_schemas() -> Vec<String> {
    vec!["public".to_string()]
}

fn default_blocked_keywords() -> Vec<String> {
    [
        "DROP",
        "DELETE",
        "UPDATE",
        "INSERT",
        "ALTER",
        "CREATE",
        "TRUNCATE",
        "EXEC",
        "EXECUTE",
        "GRANT",
        "REVOKE",
        "PRAGMA",
        "COPY",
        "VACUUM",
        "INTO",
        "INFORMATION_SCHEMA",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_blocked_prefixes() -> Vec<String> {
    vec!["PG_".to_string()]
}
