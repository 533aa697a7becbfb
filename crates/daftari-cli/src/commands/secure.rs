//! `daftari secure` command implementation.
//!
//! Secures one statement for a tenant, records the decision in the audit
//! trail and prints the secured SQL to stdout.

use anyhow::{Context, Result};
use daftari_audit::AuditLogger;
use daftari_core::DaftariConfig;
use daftari_rls::{SecuringOutcome, SqlGuard};

use super::SqlInput;

pub async fn run(
    config: &DaftariConfig,
    tenant: &str,
    session: Option<&str>,
    json: bool,
    input: SqlInput,
) -> Result<()> {
    let raw_sql = input.read()?;
    let guard = SqlGuard::from_config(config);
    let audit = AuditLogger::new(config.audit.clone()).context("failed to open audit log")?;

    let outcome = guard.explain(&raw_sql, tenant);
    if let Err(e) = audit.log_outcome(tenant, &raw_sql, &outcome, session).await {
        tracing::warn!(error = %e, "Failed to record audit event");
    }

    let outcome = SecuringOutcome::from(outcome.map(|report| report.secured_sql));
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    match outcome {
        SecuringOutcome::Secured(sql) => {
            if !json {
                println!("{sql}");
            }
            Ok(())
        }
        SecuringOutcome::Rejected(kind) => {
            eprintln!("❌ {}", kind.user_message());
            Err(kind.into())
        }
    }
}
