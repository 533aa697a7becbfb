//! # daftari-core
//!
//! Configuration shared by the Daftari crates. Everything here is plain data:
//! it is loaded once at startup from `daftari.yaml` and never mutated
//! afterwards.

// Configuration types shared across all Daftari crates
pub mod config;

// Re-export commonly used config types for convenience
pub use config::{
    AuditConfig, ConfigError, DaftariConfig, GuardConfig, LogFormat, LoggingConfig,
    TableTenancyConfig, TenancyConfig, TenantIdConfig, TenantIdType,
};
