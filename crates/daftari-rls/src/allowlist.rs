//! Table allowlist enforcement.
//!
//! Every table named in a `FROM` or `JOIN` anywhere in the statement,
//! subqueries included, must be on the configured allowlist and in an allowed
//! schema.

use daftari_core::GuardConfig;

use crate::error::RejectKind;
use crate::lexer::{SqlText, TokenKind};
use crate::resolver::{is_table_from, read_table_ref, TableRef};

/// Keywords ending a `FROM` clause at its own depth.
const FROM_CLAUSE_END: &[&str] = &[
    "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET", "WINDOW", "FETCH", "FOR", "UNION",
    "INTERSECT", "EXCEPT", "RETURNING",
];

/// Words opening a parenthesised query rather than a join group.
const QUERY_STARTS: &[&str] = &["SELECT", "WITH", "VALUES", "TABLE"];

/// All table references in the statement, grouped by the `FROM` clause
/// that names them.
pub fn referenced_tables(sql: &SqlText) -> Result<Vec<TableRef>, RejectKind> {
    let sig = sql.significant();
    let mut tables = Vec::new();

    for i in 0..sig.len() {
        if is_table_from(sql, i) {
            collect_from_items(sql, i + 1, sig[i].depth, &mut tables)?;
        } else if sql.is_word(&sig[i], "TABLE") {
            // `TABLE name` is shorthand for `SELECT * FROM name`.
            let mut at = i + 1;
            if sig.get(at).is_some_and(|t| sql.is_word(t, "ONLY")) {
                at += 1;
            }
            let (table, _) = read_table_ref(sql, at)?.ok_or_else(|| {
                RejectKind::unparseable("TABLE is not followed by a table name")
            })?;
            tables.push(table);
        }
    }

    Ok(tables)
}

/// Walk the items of a `FROM` list starting at `start` at paren `depth`:
/// the first item, items after commas and items after `JOIN`.
/// Parenthesised join groups are walked recursively. Subqueries are skipped
/// here; their own `FROM` keywords are visited separately.
fn collect_from_items(
    sql: &SqlText,
    start: usize,
    depth: usize,
    tables: &mut Vec<TableRef>,
) -> Result<(), RejectKind> {
    let sig = sql.significant();
    let mut expecting = true;
    let mut i = start;

    while i < sig.len() {
        let token = sig[i];
        if token.depth < depth {
            break;
        }
        if token.depth > depth {
            i += 1;
            continue;
        }
        if FROM_CLAUSE_END.iter().any(|k| sql.is_word(&token, k)) {
            break;
        }

        if expecting {
            if sql.is_word(&token, "LATERAL") || sql.is_word(&token, "ONLY") {
                i += 1;
                continue;
            }
            expecting = false;
            if token.kind == TokenKind::LParen {
                let close = sql
                    .matching_paren(i)
                    .ok_or_else(|| RejectKind::unparseable("unbalanced parentheses"))?;
                let is_query = sig
                    .get(i + 1)
                    .is_some_and(|t| QUERY_STARTS.iter().any(|k| sql.is_word(t, k)));
                if !is_query {
                    collect_from_items(sql, i + 1, depth + 1, tables)?;
                }
                i = close + 1;
                continue;
            }
            if let Some((table, next)) = read_table_ref(sql, i)? {
                tables.push(table);
                i = next;
                continue;
            }
        }

        if sql.is_symbol(&token, ',') || sql.is_word(&token, "JOIN") {
            expecting = true;
        }
        i += 1;
    }

    Ok(())
}

/// Check every referenced table and return them.
pub fn check(sql: &SqlText, config: &GuardConfig) -> Result<Vec<TableRef>, RejectKind> {
    let tables = referenced_tables(sql)?;
    for table in &tables {
        let schema_ok = table
            .schema
            .as_deref()
            .is_none_or(|schema| config.is_schema_allowed(schema));
        if !schema_ok || !config.is_table_allowed(&table.table_name) {
            return Err(RejectKind::UnauthorizedTable {
                table: table.reference.clone(),
            });
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(sql: &str) -> Vec<String> {
        referenced_tables(&SqlText::parse(sql).unwrap())
            .unwrap()
            .into_iter()
            .map(|t| t.reference)
            .collect()
    }

    fn check_sql(sql: &str) -> Result<Vec<TableRef>, RejectKind> {
        check(&SqlText::parse(sql).unwrap(), &GuardConfig::default())
    }

    #[test]
    fn test_joins_and_comma_lists() {
        assert_eq!(
            names(
                "SELECT * FROM products p JOIN sales s ON s.product_id = p.id \
                 LEFT OUTER JOIN inventories i USING (product_id), expenses e WHERE 1=1"
            ),
            vec!["products", "sales", "inventories", "expenses"]
        );
    }

    #[test]
    fn test_comma_after_join_condition() {
        assert_eq!(
            names("SELECT * FROM products p JOIN sales s ON (s.product_id = p.id), secrets"),
            vec!["products", "sales", "secrets"]
        );
    }

    #[test]
    fn test_subqueries() {
        assert_eq!(
            names(
                "SELECT * FROM sales WHERE product_id IN (SELECT id FROM products) \
                 AND EXISTS (SELECT 1 FROM secrets x)"
            ),
            vec!["sales", "products", "secrets"]
        );
        assert_eq!(
            names("SELECT * FROM sales, (SELECT 1 FROM products) d, secrets"),
            vec!["sales", "secrets", "products"]
        );
        assert_eq!(
            names("SELECT * FROM sales WHERE id IN (TABLE secrets)"),
            vec!["sales", "secrets"]
        );
    }

    #[test]
    fn test_parenthesised_join_groups() {
        assert_eq!(
            names("SELECT * FROM sales s JOIN (secrets x CROSS JOIN products p) ON true"),
            vec!["sales", "secrets", "products"]
        );
        assert_eq!(
            names("SELECT * FROM ((sales JOIN products ON true) JOIN expenses ON true)"),
            vec!["sales", "products", "expenses"]
        );
        assert_eq!(
            names("SELECT * FROM sales, LATERAL (SELECT 1 FROM secrets) d, products"),
            vec!["sales", "products", "secrets"]
        );
    }

    #[test]
    fn test_set_operations_inside_sublinks() {
        assert_eq!(
            names("SELECT * FROM sales WHERE id IN ((SELECT 1) UNION SELECT id FROM secrets)"),
            vec!["sales", "secrets"]
        );
        assert_eq!(
            names("SELECT * FROM sales WHERE id IN ((SELECT 1) UNION TABLE secrets)"),
            vec!["sales", "secrets"]
        );
        assert_eq!(
            names("SELECT * FROM sales WHERE id IN (SELECT 1 UNION TABLE ONLY public.secrets)"),
            vec!["sales", "public.secrets"]
        );
    }

    #[test]
    fn test_expression_from_is_not_a_table() {
        assert_eq!(
            names("SELECT EXTRACT(YEAR FROM sold_at), SUBSTRING(name FROM 1 FOR 3) FROM sales"),
            vec!["sales"]
        );
        assert_eq!(
            names("SELECT * FROM sales WHERE a IS DISTINCT FROM b"),
            vec!["sales"]
        );
    }

    #[test]
    fn test_rejects_unlisted_table() {
        assert_eq!(
            check_sql("SELECT * FROM products p JOIN users u ON u.id = p.owner_id"),
            Err(RejectKind::UnauthorizedTable {
                table: "users".to_string()
            })
        );
        assert_eq!(
            check_sql("SELECT * FROM sales WHERE id IN (SELECT id FROM secrets)"),
            Err(RejectKind::UnauthorizedTable {
                table: "secrets".to_string()
            })
        );
    }

    #[test]
    fn test_schema_must_be_allowed() {
        assert!(check_sql("SELECT * FROM public.products").is_ok());
        assert!(check_sql("SELECT * FROM PUBLIC.\"products\"").is_ok());
        assert_eq!(
            check_sql("SELECT * FROM audit.products"),
            Err(RejectKind::UnauthorizedTable {
                table: "audit.products".to_string()
            })
        );
    }

    #[test]
    fn test_hidden_tables_are_rejected() {
        for (sql, table) in [
            (
                "SELECT * FROM sales s JOIN (secrets x CROSS JOIN products p) ON true",
                "secrets",
            ),
            (
                "SELECT * FROM sales WHERE id IN ((SELECT 1) UNION SELECT id FROM secrets)",
                "secrets",
            ),
            (
                "SELECT * FROM sales WHERE id IN ((SELECT 1) UNION TABLE secrets)",
                "secrets",
            ),
        ] {
            assert_eq!(
                check_sql(sql),
                Err(RejectKind::UnauthorizedTable {
                    table: table.to_string()
                }),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_table_function_is_unauthorized() {
        assert!(matches!(
            check_sql("SELECT * FROM products, generate_series(1, 10) g"),
            Err(RejectKind::UnauthorizedTable { .. })
        ));
    }

    #[test]
    fn test_case_insensitive() {
        let tables = check_sql("SELECT * FROM Products JOIN SALES ON true").unwrap();
        assert_eq!(tables.len(), 2);
    }
}
