//! `daftari explain` command implementation.
//!
//! Shows each decision the guard made for a statement. Nothing is audited.

use anyhow::Result;
use daftari_core::DaftariConfig;
use daftari_rls::{LimitAction, SecuringReport, SqlGuard};

use super::SqlInput;

pub fn run(config: &DaftariConfig, tenant: &str, json: bool, input: SqlInput) -> Result<()> {
    let raw_sql = input.read()?;
    let guard = SqlGuard::from_config(config);

    let report = match guard.explain(&raw_sql, tenant) {
        Ok(report) => report,
        Err(kind) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&kind)?);
            } else {
                println!("❌ Rejected [{}]: {kind}", kind.code());
            }
            return Err(kind.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &SecuringReport) {
    println!("🔍 Securing report for tenant {}", report.tenant_id);
    println!("{}", "─".repeat(60));
    println!("  Normalized:    {}", report.normalized_sql);
    println!(
        "  Primary table: {} (qualifier {})",
        report.primary_table.reference,
        report.primary_table.qualifier()
    );

    let anchor = report
        .anchor
        .map(|kind| format!("before {kind}"))
        .unwrap_or_else(|| "end of statement".to_string());
    println!("  Filter:        {} ({anchor})", report.predicate);
    if report.already_scoped {
        println!("                 already present, statement left unchanged");
    }

    let tables: Vec<_> = report.tables.iter().map(|t| t.reference.as_str()).collect();
    println!("  Tables:        {}", tables.join(", "));
    println!("  Limit:         {}", describe_limit(&report.limit));
    println!("{}", "─".repeat(60));
    println!("✅ {}", report.secured_sql);
}

fn describe_limit(action: &LimitAction) -> String {
    match action {
        LimitAction::Kept => "kept as written".to_string(),
        LimitAction::Appended { limit } => format!("appended LIMIT {limit}"),
        LimitAction::Clamped { from, to } => format!("clamped {from} to {to}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_describe_limit() {
        assert_eq!(describe_limit(&LimitAction::Kept), "kept as written");
        assert_eq!(
            describe_limit(&LimitAction::Appended { limit: 1000 }),
            "appended LIMIT 1000"
        );
        assert_eq!(
            describe_limit(&LimitAction::Clamped {
                from: "ALL".to_string(),
                to: 10000
            }),
            "clamped ALL to 10000"
        );
    }

    #[test]
    fn test_explain_rejects_unknown_table() {
        let input = SqlInput {
            sql: Some("SELECT * FROM users".to_string()),
            file: None,
        };
        assert!(run(&DaftariConfig::default(), "b1", true, input).is_err());
    }
}
