//! Tenancy configuration for the shared multi-tenant database.
//!
//! Defines which column ties a row to its tenant, per table. Every table the
//! guard allows is tenant-scoped; there are no global tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{is_plain_identifier, ConfigError};

/// Configuration for tenant isolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Tenant identifier configuration.
    #[serde(default)]
    pub tenant_id: TenantIdConfig,

    /// Default column name for tenant isolation.
    /// Used when not overridden per-table.
    #[serde(default = "default_tenant_column")]
    pub default_column: String,

    /// Per-table tenant column configuration.
    #[serde(default)]
    pub tables: HashMap<String, TableTenancyConfig>,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            tenant_id: TenantIdConfig::default(),
            default_column: default_tenant_column(),
            tables: HashMap::new(),
        }
    }
}

/// Shape of tenant identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantIdType {
    /// Any non-empty string.
    #[default]
    String,
    /// Must parse as a UUID.
    Uuid,
}

/// Tenant identifier type configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantIdConfig {
    /// Type of tenant identifier.
    #[serde(default, rename = "type")]
    pub id_type: TenantIdType,

    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Per-table tenancy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableTenancyConfig {
    /// The column name used for tenant isolation in this table.
    #[serde(default)]
    pub tenant_column: Option<String>,

    /// Column name alias (for compatibility).
    #[serde(default)]
    pub column: Option<String>,
}

impl TableTenancyConfig {
    /// Get the effective tenant column name.
    pub fn get_column(&self) -> Option<&str> {
        self.tenant_column.as_deref().or(self.column.as_deref())
    }
}

impl TenancyConfig {
    /// Load tenancy configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Load tenancy configuration from a file path relative to a base directory.
    ///
    /// If the tenancy_file path is absolute, it is used directly.
    /// Otherwise, it is resolved relative to the base_dir.
    pub fn load_from_path(
        tenancy_file: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let tenancy_file = tenancy_file.as_ref();
        let tenancy_path = if tenancy_file.is_absolute() {
            tenancy_file.to_path_buf()
        } else {
            base_dir.as_ref().join(tenancy_file)
        };

        if tenancy_path.exists() {
            Self::from_file(&tenancy_path)
        } else {
            Err(ConfigError::Config(format!(
                "Tenancy file not found: {}",
                tenancy_path.display()
            )))
        }
    }

    /// Parse tenancy configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Get the tenant column for a given table.
    ///
    /// Table names are matched case-insensitively; unconfigured tables use
    /// `default_column`.
    pub fn get_tenant_column(&self, table_name: &str) -> &str {
        let wanted = table_name.to_ascii_lowercase();
        self.tables
            .iter()
            .find(|(name, _)| name.to_ascii_lowercase() == wanted)
            .and_then(|(_, table)| table.get_column())
            .unwrap_or(&self.default_column)
    }

    /// Every configured tenant column must be a plain identifier, since it is
    /// spliced verbatim into SQL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_plain_identifier(&self.default_column) {
            return Err(ConfigError::Config(format!(
                "tenancy.default_column '{}' is not a plain identifier",
                self.default_column
            )));
        }

        for (table, config) in &self.tables {
            if let Some(column) = config.get_column() {
                if !is_plain_identifier(column) {
                    return Err(ConfigError::Config(format!(
                        "tenant column '{column}' for table '{table}' is not a plain identifier"
                    )));
                }
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_tenant_column() -> String {
    "business_id".to_string()
}
