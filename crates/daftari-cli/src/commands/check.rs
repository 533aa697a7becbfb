//! `daftari check` command implementation.
//!
//! Validates a configuration file for consistency and correctness:
//! - YAML parsing and tenancy file resolution
//! - Field validation (identifiers, limits)
//! - Cross-section consistency (allowlist vs blocklist vs tenancy)
//! - Warning detection for weakened settings

use anyhow::Result;
use std::path::{Path, PathBuf};

use daftari_core::DaftariConfig;

/// Keywords whose removal from the blocklist weakens the read-only guarantee.
const ESSENTIAL_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "CREATE", "TRUNCATE", "GRANT", "INTO",
];

// ============================================================================
// Check Result Types
// ============================================================================

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational message.
    Info,
    /// Warning - may indicate a potential issue.
    Warning,
    /// Error - configuration is invalid.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Category of the check that produced this finding.
    pub category: String,
    pub message: String,
    /// File where the issue was found.
    pub file: Option<PathBuf>,
    /// Location within the file (e.g., "guard.allowed_tables").
    pub location: Option<String>,
}

impl CheckFinding {
    fn error(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, message)
    }

    fn warning(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    fn info(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, message)
    }

    fn new(severity: Severity, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            file: None,
            location: None,
        }
    }

    fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Results from running all checks.
#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
}

impl CheckResults {
    fn add(&mut self, finding: CheckFinding) {
        self.findings.push(finding);
    }

    fn extend(&mut self, findings: impl IntoIterator<Item = CheckFinding>) {
        self.findings.extend(findings);
    }

    /// Returns true if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    /// Count of errors.
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Print human-readable summary.
    pub fn print_summary(&self) {
        let mut sorted: Vec<_> = self.findings.iter().collect();
        sorted.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.category.cmp(&b.category)));

        let errors = self.count(Severity::Error);
        let warnings = self.count(Severity::Warning);

        for (severity, title) in [
            (Severity::Error, "❌ Errors"),
            (Severity::Warning, "⚠️  Warnings"),
            (Severity::Info, "ℹ️  Info"),
        ] {
            let group: Vec<_> = sorted.iter().filter(|f| f.severity == severity).collect();
            if group.is_empty() {
                continue;
            }
            println!("\n{title} ({}):", group.len());
            println!("{}", "─".repeat(60));
            for finding in group {
                print_finding(finding);
            }
        }

        println!();
        println!("{}", "═".repeat(60));
        if errors == 0 && warnings == 0 {
            println!("✅ All checks passed!");
        } else {
            println!("Summary: {errors} error(s), {warnings} warning(s)");
            if errors > 0 {
                println!("\n❌ Configuration has errors that must be fixed.");
            }
        }
    }
}

fn print_finding(finding: &CheckFinding) {
    let icon = match finding.severity {
        Severity::Error => "✗",
        Severity::Warning => "⚠",
        Severity::Info => "ℹ",
    };

    let location = match (&finding.file, &finding.location) {
        (Some(f), Some(l)) => format!(" [{}:{}]", f.display(), l),
        (Some(f), None) => format!(" [{}]", f.display()),
        (None, Some(l)) => format!(" [{}]", l),
        (None, None) => String::new(),
    };

    println!(
        "  {} [{}]{}: {}",
        icon, finding.category, location, finding.message
    );
}

// ============================================================================
// Main Check Runner
// ============================================================================

/// Run all configuration checks quietly (no output), returns the results.
pub fn run_quiet(config_path: &Path) -> CheckResults {
    let mut results = CheckResults::default();

    if !config_path.exists() {
        results.add(
            CheckFinding::info("load", "file not found, built-in defaults apply")
                .with_file(config_path),
        );
        results.extend(check_config(&DaftariConfig::default()));
        return results;
    }

    match DaftariConfig::load_resolved(config_path) {
        Ok(config) => results.extend(
            check_config(&config)
                .into_iter()
                .map(|finding| finding.with_file(config_path)),
        ),
        Err(e) => results.add(CheckFinding::error("load", e.to_string()).with_file(config_path)),
    }

    results
}

/// Run all configuration checks.
pub fn run(config_path: &Path) -> Result<()> {
    println!("🔍 Checking Daftari configuration at {}...", config_path.display());

    let results = run_quiet(config_path);
    results.print_summary();

    if results.has_errors() {
        anyhow::bail!(
            "Configuration check failed with {} error(s)",
            results.error_count()
        );
    }

    Ok(())
}

/// Every check that runs against a loaded configuration.
pub fn check_config(config: &DaftariConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    if let Err(e) = config.validate() {
        findings.push(CheckFinding::error("validate", e.to_string()));
    }

    findings.extend(check_allowlist_conflicts(config));
    findings.extend(check_tenancy_tables(config));
    findings.extend(check_blocklist(config));
    findings.extend(check_limits(config));
    findings.extend(check_audit(config));

    if !config.guard.strict_parse {
        findings.push(
            CheckFinding::info(
                "guard",
                "strict_parse is off; secured statements are not re-parsed",
            )
            .with_location("guard.strict_parse"),
        );
    }

    findings
}

// ============================================================================
// Individual Checks
// ============================================================================

/// An allowed table that is also blocked can never be queried.
fn check_allowlist_conflicts(config: &DaftariConfig) -> Vec<CheckFinding> {
    let guard = &config.guard;
    let mut findings = Vec::new();

    for table in &guard.allowed_tables {
        let upper = table.to_ascii_uppercase();
        let blocked_by = guard
            .blocked_keywords
            .iter()
            .find(|k| k.eq_ignore_ascii_case(table))
            .or_else(|| {
                guard
                    .blocked_prefixes
                    .iter()
                    .find(|p| upper.starts_with(&p.to_ascii_uppercase()))
            });

        if let Some(rule) = blocked_by {
            findings.push(
                CheckFinding::error(
                    "allowlist",
                    format!("table '{table}' is allowed but blocked by '{rule}'"),
                )
                .with_location("guard.allowed_tables"),
            );
        }
    }

    findings
}

/// Tenancy overrides for tables the guard never lets through are dead config.
fn check_tenancy_tables(config: &DaftariConfig) -> Vec<CheckFinding> {
    let mut tables: Vec<_> = config.tenancy.tables.keys().collect();
    tables.sort();

    tables
        .into_iter()
        .filter(|table| !config.guard.is_table_allowed(table))
        .map(|table| {
            CheckFinding::warning(
                "tenancy",
                format!("tenant column configured for '{table}', which is not an allowed table"),
            )
            .with_location(format!("tenancy.tables.{table}"))
        })
        .collect()
}

fn check_blocklist(config: &DaftariConfig) -> Vec<CheckFinding> {
    ESSENTIAL_KEYWORDS
        .iter()
        .filter(|keyword| {
            !config
                .guard
                .blocked_keywords
                .iter()
                .any(|k| k.eq_ignore_ascii_case(keyword))
        })
        .map(|keyword| {
            CheckFinding::warning("blocklist", format!("'{keyword}' is not a blocked keyword"))
                .with_location("guard.blocked_keywords")
        })
        .collect()
}

fn check_limits(config: &DaftariConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();
    if !config.guard.clamp_explicit_limit {
        findings.push(
            CheckFinding::warning(
                "limit",
                format!(
                    "clamp_explicit_limit is off; a model may request more than {} rows",
                    config.guard.max_limit
                ),
            )
            .with_location("guard.clamp_explicit_limit"),
        );
    }
    findings
}

fn check_audit(config: &DaftariConfig) -> Vec<CheckFinding> {
    let audit = &config.audit;
    if !audit.enabled {
        return vec![
            CheckFinding::warning("audit", "audit logging is disabled").with_location("audit.enabled"),
        ];
    }

    let mut findings = Vec::new();
    if !audit.log_rejected {
        findings.push(
            CheckFinding::warning("audit", "rejected statements are not recorded")
                .with_location("audit.log_rejected"),
        );
    }
    if !audit.log_secured {
        findings.push(
            CheckFinding::info("audit", "secured statements are not recorded")
                .with_location("audit.log_secured"),
        );
    }
    findings
}
