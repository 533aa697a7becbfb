//! Table and alias resolution.
//!
//! Identifies the primary table of a statement (the first table after its
//! top-level `FROM`) and the name the tenant predicate must be qualified
//! with: the alias when one is declared, otherwise the reference as written.

use serde::Serialize;

use crate::error::RejectKind;
use crate::lexer::{SqlText, Token, TokenKind};

/// Words that can never be a table name or an alias.
const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET", "FETCH", "FOR",
    "WINDOW", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "NATURAL", "ON",
    "USING", "UNION", "INTERSECT", "EXCEPT", "LATERAL", "AS", "AND", "OR", "NOT", "ONLY",
    "TABLESAMPLE", "WITH", "RETURNING",
];

const SET_OPERATIONS: &[&str] = &["UNION", "INTERSECT", "EXCEPT"];

/// Top-level clauses the clause locator does not model.
const UNSUPPORTED_CLAUSES: &[&str] = &["FETCH", "WINDOW", "FOR"];

/// A table reference as it appears in a `FROM` or `JOIN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    /// Schema (or `catalog.schema`) qualifier, unquoted.
    pub schema: Option<String>,
    /// Bare table name, unquoted.
    pub table_name: String,
    /// Alias exactly as written, quotes included.
    pub alias: Option<String>,
    /// The reference exactly as written, e.g. `public.products`.
    pub reference: String,
}

impl TableRef {
    /// Name that qualifies columns of this table in the statement.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.reference)
    }
}

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

fn is_name(sql: &SqlText, token: &Token) -> bool {
    match token.kind {
        TokenKind::QuotedIdent => true,
        TokenKind::Word => !is_reserved(sql.text(token)),
        _ => false,
    }
}

/// `FROM` at `index` introduces table references. Only `IS DISTINCT FROM`
/// and a `FROM` directly inside `EXTRACT`, `SUBSTRING`, `TRIM` or `OVERLAY`
/// are excluded, so an unrecognised shape is still checked as a table list.
pub(crate) fn is_table_from(sql: &SqlText, index: usize) -> bool {
    let sig = sql.significant();
    let Some(token) = sig.get(index) else {
        return false;
    };
    sql.is_word(token, "FROM")
        && !token.in_from_call
        && !(index > 0 && sql.is_word(&sig[index - 1], "DISTINCT"))
}

/// Read a possibly qualified table name and optional alias starting at
/// significant token `index`. Returns the reference and the index just past
/// it, or `None` when no table name starts there.
pub(crate) fn read_table_ref(
    sql: &SqlText,
    index: usize,
) -> Result<Option<(TableRef, usize)>, RejectKind> {
    let sig = sql.significant();
    let Some(first) = sig.get(index).filter(|t| is_name(sql, t)) else {
        return Ok(None);
    };

    let mut parts: Vec<String> = sql.identifier(first).into_iter().collect();
    let mut last = *first;
    let mut next = index + 1;
    while let (Some(dot), Some(part)) = (sig.get(next), sig.get(next + 1)) {
        if !sql.is_symbol(dot, '.')
            || !matches!(part.kind, TokenKind::Word | TokenKind::QuotedIdent)
        {
            break;
        }
        parts.extend(sql.identifier(part));
        last = *part;
        next += 2;
    }

    let reference = sql.as_str()[first.start..last.end].to_string();
    let table_name = parts.pop().unwrap_or_default();
    let schema = (!parts.is_empty()).then(|| parts.join("."));

    let mut alias = None;
    match sig.get(next) {
        Some(t) if sql.is_word(t, "AS") => match sig.get(next + 1) {
            Some(a) if is_name(sql, a) => {
                alias = Some(sql.text(a).to_string());
                next += 2;
            }
            _ => {
                return Err(RejectKind::unparseable(format!(
                    "AS after {reference} is not followed by an alias"
                )));
            }
        },
        Some(t) if is_name(sql, t) => {
            alias = Some(sql.text(t).to_string());
            next += 1;
        }
        _ => {}
    }

    Ok(Some((
        TableRef {
            schema,
            table_name,
            alias,
            reference,
        },
        next,
    )))
}

/// Resolve the primary table of the statement.
pub fn resolve_primary(sql: &SqlText) -> Result<TableRef, RejectKind> {
    let sig = sql.significant();

    if let Some(op) = sig
        .iter()
        .find(|t| t.depth == 0 && SET_OPERATIONS.iter().any(|k| sql.is_word(t, k)))
    {
        return Err(RejectKind::unparseable(format!(
            "top-level {} is not supported",
            sql.text(op).to_ascii_uppercase()
        )));
    }

    if let Some(clause) = sig
        .iter()
        .find(|t| t.depth == 0 && UNSUPPORTED_CLAUSES.iter().any(|k| sql.is_word(t, k)))
    {
        return Err(RejectKind::unparseable(format!(
            "top-level {} is not supported",
            sql.text(clause).to_ascii_uppercase()
        )));
    }

    let from = (0..sig.len())
        .find(|&i| sig[i].depth == 0 && is_table_from(sql, i))
        .ok_or_else(|| RejectKind::unparseable("no top-level FROM clause"))?;

    if sig
        .get(from + 1)
        .is_some_and(|t| t.kind == TokenKind::LParen)
    {
        return Err(RejectKind::unparseable(
            "a derived table cannot be the primary table",
        ));
    }

    let (table, next) = read_table_ref(sql, from + 1)?
        .ok_or_else(|| RejectKind::unparseable("missing table name after FROM"))?;

    // Column alias lists and table functions both rename or hide the
    // tenant column.
    if sig.get(next).is_some_and(|t| t.kind == TokenKind::LParen) {
        return Err(RejectKind::unparseable(format!(
            "unexpected parenthesis after {}",
            table.reference
        )));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn primary(sql: &str) -> Result<TableRef, RejectKind> {
        resolve_primary(&SqlText::parse(sql).unwrap())
    }

    #[test]
    fn test_plain_table() {
        let table = primary("SELECT * FROM products WHERE price > 3").unwrap();
        assert_eq!(
            table,
            TableRef {
                schema: None,
                table_name: "products".to_string(),
                alias: None,
                reference: "products".to_string(),
            }
        );
        assert_eq!(table.qualifier(), "products");
    }

    #[test]
    fn test_alias_forms() {
        assert_eq!(primary("SELECT * FROM products p").unwrap().qualifier(), "p");
        assert_eq!(primary("SELECT * FROM products AS p").unwrap().qualifier(), "p");
        assert_eq!(
            primary("SELECT * FROM products \"P\" WHERE 1=1").unwrap().qualifier(),
            "\"P\""
        );
        assert_eq!(
            primary("SELECT * FROM products p JOIN sales s ON s.product_id = p.id")
                .unwrap()
                .qualifier(),
            "p"
        );
    }

    #[test]
    fn test_no_alias_before_clause() {
        for sql in [
            "SELECT * FROM products WHERE 1=1",
            "SELECT * FROM products ORDER BY name",
            "SELECT * FROM products LEFT JOIN sales ON true",
            "SELECT * FROM products, sales",
        ] {
            assert_eq!(primary(sql).unwrap().alias, None, "{sql}");
        }
    }

    #[test]
    fn test_schema_qualified() {
        let table = primary("SELECT * FROM public.products").unwrap();
        assert_eq!(table.schema.as_deref(), Some("public"));
        assert_eq!(table.table_name, "products");
        assert_eq!(table.qualifier(), "public.products");
    }

    #[test]
    fn test_quoted_name() {
        let table = primary("SELECT * FROM \"Sales\" s").unwrap();
        assert_eq!(table.table_name, "Sales");
        assert_eq!(table.reference, "\"Sales\"");
        assert_eq!(table.qualifier(), "s");
    }

    #[test]
    fn test_skips_non_table_from() {
        let table = primary(
            "SELECT EXTRACT(MONTH FROM sold_at) AS m, a IS DISTINCT FROM b FROM sales",
        )
        .unwrap();
        assert_eq!(table.table_name, "sales");
    }

    #[test]
    fn test_rejects_unmodelled_top_level_clauses() {
        for sql in [
            "SELECT * FROM sales FETCH FIRST 5 ROWS ONLY",
            "SELECT sum(amount) OVER w FROM sales WINDOW w AS (ORDER BY id)",
            "SELECT * FROM sales FOR UPDATE",
            "SELECT * FROM sales WHERE id = 1 FOR SHARE",
        ] {
            assert!(
                matches!(primary(sql), Err(RejectKind::UnparseableStatement { .. })),
                "{sql}"
            );
        }
        assert_eq!(
            primary("SELECT SUBSTRING(name FROM 1 FOR 3) FROM sales")
                .unwrap()
                .table_name,
            "sales"
        );
    }

    #[test]
    fn test_unresolvable_shapes() {
        for sql in [
            "SELECT 1",
            "SELECT * FROM (SELECT * FROM products) x",
            "SELECT * FROM products AS WHERE x",
            "SELECT * FROM products UNION SELECT * FROM sales",
            "SELECT * FROM WHERE",
            "SELECT * FROM sales s(business_id, amount)",
            "SELECT * FROM sales AS s (x)",
            "SELECT * FROM generate_series(1, 10) g",
            "SELECT * FROM sales WHERE 1=1UNION SELECT * FROM sales",
        ] {
            assert!(
                matches!(primary(sql), Err(RejectKind::UnparseableStatement { .. })),
                "{sql}"
            );
        }
    }
}
