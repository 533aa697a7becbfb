//! `daftari audit` command implementation.

use anyhow::{Context, Result};
use daftari_audit::{AuditEventType, AuditFilter, AuditLogger};
use daftari_core::DaftariConfig;

/// Options for querying the audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub tenant: Option<String>,
    pub session: Option<String>,
    pub rejected: bool,
    pub code: Option<String>,
    pub limit: usize,
    pub json: bool,
}

impl AuditQuery {
    fn filter(&self) -> AuditFilter {
        // A code only ever appears on rejections.
        let rejected = self.rejected || self.code.is_some();
        AuditFilter {
            tenant_id: self.tenant.clone(),
            session_id: self.session.clone(),
            event_type: rejected.then_some(AuditEventType::QueryRejected),
            reject_code: self.code.clone(),
            limit: Some(self.limit),
            ..Default::default()
        }
    }
}

pub async fn run(config: &DaftariConfig, query: AuditQuery) -> Result<()> {
    if !config.audit.enabled {
        println!("⚠️  Audit logging is disabled in this configuration.");
        return Ok(());
    }

    let logger = AuditLogger::new(config.audit.clone()).context("failed to open audit log")?;
    let filter = query.filter();
    let total = logger.count(filter.clone()).await?;
    let events = logger.query(filter).await?;

    if query.json {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(());
    }

    if events.is_empty() {
        println!(
            "No matching audit events in {}",
            AuditLogger::resolve_log_path(&config.audit).display()
        );
        return Ok(());
    }

    println!("📜 Showing {} of {} event(s), newest first:", events.len(), total);
    for event in &events {
        println!("{}", event.to_log_line());
    }
    Ok(())
}
