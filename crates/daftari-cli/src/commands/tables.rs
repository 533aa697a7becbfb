//! `daftari tables` command implementation.

use daftari_core::DaftariConfig;

/// Allowlisted tables paired with the column that scopes them.
pub fn table_columns(config: &DaftariConfig) -> Vec<(&str, &str)> {
    let mut rows: Vec<_> = config
        .guard
        .allowed_tables
        .iter()
        .map(|table| (table.as_str(), config.tenancy.get_tenant_column(table)))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    rows
}

pub fn run(config: &DaftariConfig) {
    let rows = table_columns(config);
    let width = rows.iter().map(|(t, _)| t.len()).max().unwrap_or(0).max(5);

    println!("📊 Allowed tables ({}):", rows.len());
    println!("  {:<width$}  TENANT COLUMN", "TABLE");
    for (table, column) in rows {
        println!("  {table:<width$}  {column}");
    }
    println!();
    println!(
        "  Default LIMIT {}, maximum {}",
        config.guard.default_limit, config.guard.max_limit
    );
}
