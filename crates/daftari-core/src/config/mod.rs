//! Configuration types for the Daftari SQL guard.
//!
//! Configuration is loaded from YAML (`daftari.yaml`, optionally with a
//! separate `tenancy.yaml`) and combined into a single `DaftariConfig`.
//!
//! # Configuration Files
//!
//! - **daftari.yaml**: guard limits and allowlist, audit and logging settings
//! - **tenancy.yaml**: tenant column per table (may also be inlined)

pub mod audit;
pub mod guard;
pub mod logging;
pub mod tenancy;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use audit::AuditConfig;
pub use guard::GuardConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use tenancy::{TableTenancyConfig, TenancyConfig, TenantIdConfig, TenantIdType};

/// Complete Daftari configuration loaded from files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaftariConfig {
    /// Project name.
    #[serde(default)]
    pub project: Option<String>,

    /// Tenancy configuration (inline or from file).
    #[serde(default)]
    pub tenancy: TenancyConfig,

    /// Path to tenancy configuration file (alternative to inline).
    #[serde(default)]
    pub tenancy_file: Option<PathBuf>,

    /// Statement guard settings.
    #[serde(default)]
    pub guard: GuardConfig,

    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Diagnostic logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DaftariConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve the external tenancy file, without
    /// validating.
    ///
    /// A relative `tenancy_file` is resolved against the directory holding
    /// the main configuration file.
    pub fn load_resolved(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(tenancy_file) = &config.tenancy_file {
            config.tenancy = TenancyConfig::load_from_path(tenancy_file, &base_dir)?;
        }

        Ok(config)
    }

    /// Load configuration, resolve the external tenancy file and validate.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::load_resolved(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration at `path`, or fall back to defaults when the
    /// file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_with_context(path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.guard.validate()?;
        self.tenancy.validate()?;
        Ok(())
    }

    /// Get the tenancy configuration.
    pub fn get_tenancy(&self) -> &TenancyConfig {
        &self.tenancy
    }
}

/// Whether `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub(crate) fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = DaftariConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tenancy.default_column, "business_id");
        assert_eq!(config.guard.default_limit, 1000);
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
project: mali-daftari

tenancy:
  tenant_id:
    type: uuid
  default_column: business_id
  tables:
    businesses:
      tenant_column: id

guard:
  allowed_tables: [products, sales]
  default_limit: 50
  max_limit: 500

audit:
  enabled: false

logging:
  level: debug
  format: json
"#;
        let config = DaftariConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.project.as_deref(), Some("mali-daftari"));
        assert_eq!(config.tenancy.tenant_id.id_type, TenantIdType::Uuid);
        assert_eq!(config.tenancy.get_tenant_column("businesses"), "id");
        assert_eq!(config.guard.allowed_tables, vec!["products", "sales"]);
        assert_eq!(config.guard.max_limit, 500);
        assert!(!config.audit.enabled);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_with_tenancy_file() {
        let dir = tempfile::tempdir().unwrap();

        let mut tenancy = fs::File::create(dir.path().join("tenancy.yaml")).unwrap();
        writeln!(tenancy, "default_column: shop_id").unwrap();

        let main_path = dir.path().join("daftari.yaml");
        let mut main = fs::File::create(&main_path).unwrap();
        writeln!(main, "tenancy_file: tenancy.yaml").unwrap();

        let config = DaftariConfig::load_with_context(&main_path).unwrap();
        assert_eq!(config.tenancy.default_column, "shop_id");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaftariConfig::load_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.guard.max_limit, 10000);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let yaml = r#"
guard:
  default_limit: 5000
  max_limit: 100
"#;
        let config = DaftariConfig::from_yaml(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Config(_))));
    }

    #[test]
    fn test_plain_identifier() {
        assert!(is_plain_identifier("business_id"));
        assert!(is_plain_identifier("_x1"));
        assert!(!is_plain_identifier("1abc"));
        assert!(!is_plain_identifier("id; DROP"));
        assert!(!is_plain_identifier(""));
    }
}
