//! The securing pipeline.
//!
//! `SqlGuard` runs model-generated SQL through every stage in order and
//! either returns a tenant-scoped, row-limited statement or a [`RejectKind`].
//! It holds only immutable configuration behind an `Arc`, so one guard can be
//! cloned into any number of concurrent request handlers.

use std::fmt;
use std::sync::Arc;

use daftari_core::{DaftariConfig, GuardConfig, TenancyConfig, TenantIdType};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clauses::{self, ClauseKind};
use crate::error::RejectKind;
use crate::injector;
use crate::lexer::SqlText;
use crate::limit::{self, LimitAction};
use crate::parser::SqlAnalyzer;
use crate::resolver::{self, TableRef};
use crate::{allowlist, classifier};

/// Characters of SQL included in rejection logs.
const LOG_PREVIEW_CHARS: usize = 50;

/// One securing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuringRequest {
    /// Text produced by the language model.
    pub raw_sql: String,
    /// Tenant the session is authenticated as.
    pub tenant_id: String,
}

impl SecuringRequest {
    pub fn new(raw_sql: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            raw_sql: raw_sql.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// Result of securing one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SecuringOutcome {
    Secured(String),
    Rejected(RejectKind),
}

impl SecuringOutcome {
    pub fn is_secured(&self) -> bool {
        matches!(self, Self::Secured(_))
    }

    /// The secured statement, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Secured(sql) => Some(sql),
            Self::Rejected(_) => None,
        }
    }

    pub fn into_result(self) -> Result<String, RejectKind> {
        match self {
            Self::Secured(sql) => Ok(sql),
            Self::Rejected(kind) => Err(kind),
        }
    }
}

impl From<Result<String, RejectKind>> for SecuringOutcome {
    fn from(result: Result<String, RejectKind>) -> Self {
        match result {
            Ok(sql) => Self::Secured(sql),
            Err(kind) => Self::Rejected(kind),
        }
    }
}

/// Everything the pipeline decided for an accepted statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecuringReport {
    pub original_sql: String,
    pub normalized_sql: String,
    pub secured_sql: String,
    pub tenant_id: String,
    pub primary_table: TableRef,
    /// Clause the filter was anchored at, `None` for end of statement.
    pub anchor: Option<ClauseKind>,
    pub predicate: String,
    pub already_scoped: bool,
    pub tables: Vec<TableRef>,
    pub limit: LimitAction,
}

/// Pipeline stage, used to attribute rejections in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Tenant,
    Classify,
    ResolveTable,
    Inject,
    Allowlist,
    Limit,
    ParseCheck,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Tenant => "tenant",
            Stage::Classify => "classify",
            Stage::ResolveTable => "resolve_table",
            Stage::Inject => "inject",
            Stage::Allowlist => "allowlist",
            Stage::Limit => "limit",
            Stage::ParseCheck => "parse_check",
            Stage::Verify => "verify",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct GuardSettings {
    guard: GuardConfig,
    tenancy: TenancyConfig,
}

/// Secures model-generated SQL for a tenant.
#[derive(Debug, Clone)]
pub struct SqlGuard {
    settings: Arc<GuardSettings>,
    analyzer: SqlAnalyzer,
}

impl Default for SqlGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default(), TenancyConfig::default())
    }
}

impl SqlGuard {
    pub fn new(guard: GuardConfig, tenancy: TenancyConfig) -> Self {
        Self {
            settings: Arc::new(GuardSettings { guard, tenancy }),
            analyzer: SqlAnalyzer::new(),
        }
    }

    /// Build a guard from the effective project configuration.
    pub fn from_config(config: &DaftariConfig) -> Self {
        Self::new(config.guard.clone(), config.get_tenancy().clone())
    }

    pub fn guard_config(&self) -> &GuardConfig {
        &self.settings.guard
    }

    pub fn tenancy_config(&self) -> &TenancyConfig {
        &self.settings.tenancy
    }

    /// Secure `raw_sql` for `tenant_id`.
    pub fn secure(&self, raw_sql: &str, tenant_id: &str) -> Result<String, RejectKind> {
        self.explain(raw_sql, tenant_id)
            .map(|report| report.secured_sql)
    }

    pub fn secure_request(&self, request: &SecuringRequest) -> SecuringOutcome {
        self.secure(&request.raw_sql, &request.tenant_id).into()
    }

    /// Secure `raw_sql` and report every decision made along the way.
    pub fn explain(&self, raw_sql: &str, tenant_id: &str) -> Result<SecuringReport, RejectKind> {
        self.run(raw_sql, tenant_id).map_err(|(stage, kind)| {
            warn!(
                stage = %stage,
                code = kind.code(),
                reason = %kind,
                sql = %preview(raw_sql),
                "Rejected query"
            );
            kind
        })
    }

    fn run(&self, raw_sql: &str, tenant_id: &str) -> Result<SecuringReport, (Stage, RejectKind)> {
        let guard = &self.settings.guard;
        let tenancy = &self.settings.tenancy;

        validate_tenant(tenant_id, tenancy).map_err(at(Stage::Tenant))?;

        let statement = classifier::classify(raw_sql, guard).map_err(at(Stage::Classify))?;
        debug!(sql = statement.as_str(), "Classified query");

        let location = clauses::locate(&statement);
        let primary = resolver::resolve_primary(&statement).map_err(at(Stage::ResolveTable))?;
        debug!(
            table = %primary.reference,
            qualifier = primary.qualifier(),
            anchor = ?location.anchor_kind(),
            "Resolved primary table"
        );

        let column = tenancy.get_tenant_column(&primary.table_name);
        let predicate = injector::build_predicate(primary.qualifier(), column, tenant_id);
        let injection =
            injector::inject(&statement, &location, &predicate).map_err(at(Stage::Inject))?;
        debug!(
            already_scoped = injection.already_scoped,
            "Injected tenant filter"
        );

        let tables = allowlist::check(&injection.statement, guard).map_err(at(Stage::Allowlist))?;

        let (secured, limit) =
            limit::enforce(&injection.statement, guard).map_err(at(Stage::Limit))?;
        debug!(limit = ?limit, "Enforced row limit");

        if guard.strict_parse {
            self.analyzer
                .check_secured(secured.as_str(), &primary, guard)
                .map_err(at(Stage::ParseCheck))?;
        }

        if !injector::is_scoped(&secured, &predicate) {
            return Err((Stage::Verify, RejectKind::InjectionVerificationFailed));
        }

        debug!(
            table = %primary.reference,
            tables = tables.len(),
            "Secured query"
        );

        Ok(SecuringReport {
            original_sql: raw_sql.to_string(),
            normalized_sql: statement.into_string(),
            secured_sql: secured.into_string(),
            tenant_id: tenant_id.to_string(),
            primary_table: primary,
            anchor: location.anchor_kind(),
            predicate,
            already_scoped: injection.already_scoped,
            tables,
            limit,
        })
    }
}

fn at(stage: Stage) -> impl Fn(RejectKind) -> (Stage, RejectKind) {
    move |kind| (stage, kind)
}

fn validate_tenant(tenant_id: &str, tenancy: &TenancyConfig) -> Result<(), RejectKind> {
    let invalid = |reason: &str| RejectKind::InvalidTenant {
        reason: reason.to_string(),
    };

    if tenant_id.trim().is_empty() {
        return Err(invalid("tenant id is empty"));
    }
    if tenant_id.chars().any(char::is_control) {
        return Err(invalid("tenant id contains control characters"));
    }
    if tenancy.tenant_id.id_type == TenantIdType::Uuid
        && uuid::Uuid::parse_str(tenant_id).is_err()
    {
        return Err(invalid("tenant id is not a UUID"));
    }
    Ok(())
}

/// First characters of a statement, for logs.
pub fn preview(sql: &str) -> String {
    let mut chars = sql.chars();
    let head: String = chars.by_ref().take(LOG_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

impl SecuringReport {
    /// Re-tokenize the secured statement.
    pub fn secured_statement(&self) -> Result<SqlText, RejectKind> {
        SqlText::parse(self.secured_sql.as_str())
            .map_err(|e| RejectKind::unparseable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TENANT: &str = "7f3c2a9e-0b1d-4c55-9a21-5d7e8f901234";

    fn guard() -> SqlGuard {
        SqlGuard::default()
    }

    #[test]
    fn test_secure_simple_select() {
        assert_eq!(
            guard().secure("SELECT * FROM products", "b1").unwrap(),
            "SELECT * FROM products WHERE products.business_id = 'b1' LIMIT 1000"
        );
    }

    #[test]
    fn test_secure_with_alias_and_existing_where() {
        assert_eq!(
            guard()
                .secure(
                    "SELECT p.name, s.qty FROM products p JOIN sales s ON s.product_id = p.id \
                     WHERE s.qty > 3 ORDER BY s.qty DESC LIMIT 20;",
                    "b1"
                )
                .unwrap(),
            "SELECT p.name, s.qty FROM products p JOIN sales s ON s.product_id = p.id \
             WHERE p.business_id = 'b1' AND (s.qty > 3) ORDER BY s.qty DESC LIMIT 20"
        );
    }

    #[test]
    fn test_per_table_column() {
        let mut tenancy = TenancyConfig::default();
        tenancy.tables.insert(
            "businesses".to_string(),
            daftari_core::TableTenancyConfig {
                tenant_column: Some("id".to_string()),
                column: None,
            },
        );
        let guard = SqlGuard::new(GuardConfig::default(), tenancy);
        assert_eq!(
            guard.secure("SELECT name FROM businesses b", "b1").unwrap(),
            "SELECT name FROM businesses b WHERE b.id = 'b1' LIMIT 1000"
        );
    }

    #[test]
    fn test_explain_report() {
        let report = guard()
            .explain("SELECT * FROM sales GROUP BY product_id", "b1")
            .unwrap();
        assert_eq!(report.anchor, Some(ClauseKind::GroupBy));
        assert_eq!(report.predicate, "sales.business_id = 'b1'");
        assert!(!report.already_scoped);
        assert_eq!(report.limit, LimitAction::Appended { limit: 1000 });
        assert_eq!(report.tables.len(), 1);
        assert!(report.secured_statement().is_ok());
    }

    #[test]
    fn test_secure_request_outcome() {
        let guard = guard();
        let outcome = guard.secure_request(&SecuringRequest::new("DELETE FROM sales", "b1"));
        assert_eq!(outcome, SecuringOutcome::Rejected(RejectKind::NotSelect));
        assert_eq!(outcome.sql(), None);

        let outcome = guard.secure_request(&SecuringRequest::new("SELECT * FROM sales", "b1"));
        assert!(outcome.is_secured());
    }

    #[test]
    fn test_tenant_validation() {
        let guard = guard();
        assert!(matches!(
            guard.secure("SELECT * FROM sales", "  "),
            Err(RejectKind::InvalidTenant { .. })
        ));
        assert!(matches!(
            guard.secure("SELECT * FROM sales", "b1\0"),
            Err(RejectKind::InvalidTenant { .. })
        ));

        let mut tenancy = TenancyConfig::default();
        tenancy.tenant_id.id_type = TenantIdType::Uuid;
        let guard = SqlGuard::new(GuardConfig::default(), tenancy);
        assert!(matches!(
            guard.secure("SELECT * FROM sales", "b1"),
            Err(RejectKind::InvalidTenant { .. })
        ));
        assert!(guard.secure("SELECT * FROM sales", TENANT).is_ok());
    }

    #[test]
    fn test_strict_parse() {
        let config = GuardConfig {
            strict_parse: true,
            ..Default::default()
        };
        let guard = SqlGuard::new(config, TenancyConfig::default());
        assert!(guard
            .secure("SELECT p.name FROM products p WHERE p.price > 2", "b1")
            .is_ok());
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("SELECT 1"), "SELECT 1");
        let long = "x".repeat(80);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(50)));
    }
}
