//! Full-parser cross-check of secured statements.
//!
//! The token-based stages never need a complete SQL grammar. When
//! `guard.strict_parse` is on, the secured statement is additionally run
//! through `sqlparser` and must come back as exactly one query whose
//! top-level relations agree with what the guard resolved.

use daftari_core::GuardConfig;
use sqlparser::ast::{Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::RejectKind;
use crate::resolver::TableRef;

/// Parses statements with the PostgreSQL dialect.
pub struct SqlAnalyzer {
    dialect: PostgreSqlDialect,
}

impl Clone for SqlAnalyzer {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Default for SqlAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SqlAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SqlAnalyzer(PostgreSql)")
    }
}

impl SqlAnalyzer {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Parse a SQL string into statements.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, RejectKind> {
        Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| RejectKind::unparseable(format!("parser rejected statement: {e}")))
    }

    /// Check a secured statement: one query, primary relation matches
    /// `primary`, and every top-level relation is allowlisted.
    pub fn check_secured(
        &self,
        sql: &str,
        primary: &TableRef,
        config: &GuardConfig,
    ) -> Result<(), RejectKind> {
        let statements = self.parse(sql)?;
        let [statement] = statements.as_slice() else {
            return Err(RejectKind::MultipleStatements);
        };
        if !matches!(statement, Statement::Query(_)) {
            return Err(RejectKind::NotSelect);
        }

        let relations = self.extract_tables(statement);
        let first = relations
            .first()
            .ok_or_else(|| RejectKind::unparseable("parser found no FROM relation"))?;
        if !bare_name(first).eq_ignore_ascii_case(&primary.table_name) {
            return Err(RejectKind::unparseable(format!(
                "parser resolved primary table {first}, guard resolved {}",
                primary.reference
            )));
        }

        if let Some(denied) = relations
            .iter()
            .find(|name| !config.is_table_allowed(bare_name(name)))
        {
            return Err(RejectKind::UnauthorizedTable {
                table: denied.clone(),
            });
        }
        Ok(())
    }

    /// Names of the relations in the top-level `FROM` clause and its joins.
    pub fn extract_tables(&self, stmt: &Statement) -> Vec<String> {
        let mut tables = Vec::new();
        if let Statement::Query(query) = stmt {
            if let Some(body) = query.body.as_select() {
                for table_with_joins in &body.from {
                    self.visit_table_with_joins(table_with_joins, &mut tables);
                }
            }
        }
        tables
    }

    fn visit_table_with_joins(&self, table_with_joins: &TableWithJoins, tables: &mut Vec<String>) {
        tables.extend(self.extract_table_name(&table_with_joins.relation));
        for join in &table_with_joins.joins {
            tables.extend(self.extract_table_name(&join.relation));
        }
    }

    fn extract_table_name(&self, table_factor: &TableFactor) -> Option<String> {
        match table_factor {
            TableFactor::Table { name, .. } => Some(name.to_string()),
            _ => None,
        }
    }
}

/// Last segment of a possibly qualified name, without quotes.
fn bare_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name).trim_matches('"')
}
