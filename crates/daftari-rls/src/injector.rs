//! Tenant filter injection.
//!
//! Adds `<qualifier>.<tenant_column> = '<tenant>'` as the first predicate of
//! the top-level `WHERE`. An existing condition is kept inside parentheses
//! after the filter, so a top-level `OR` in it cannot widen the result:
//!
//! ```text
//! SELECT * FROM sales WHERE a = 1 OR b = 2 LIMIT 5
//! SELECT * FROM sales WHERE sales.business_id = 't' AND (a = 1 OR b = 2) LIMIT 5
//! ```
//!
//! A statement already in that shape for the same predicate is returned
//! unchanged, which makes injection idempotent.

use crate::clauses::{find_clause, where_body_end, ClauseKind, ClauseLocation};
use crate::error::RejectKind;
use crate::lexer::{SqlText, TokenKind};

/// Result of injecting the tenant filter.
#[derive(Debug, Clone)]
pub struct Injection {
    pub statement: SqlText,
    /// The statement already carried the filter and was left untouched.
    pub already_scoped: bool,
}

/// Escape a value for use inside a single-quoted SQL literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Build the tenant predicate for a qualifier and column.
pub fn build_predicate(qualifier: &str, column: &str, tenant_id: &str) -> String {
    format!("{qualifier}.{column} = '{}'", escape_literal(tenant_id))
}

/// Inject `predicate` at `location` and verify the result.
pub fn inject(
    sql: &SqlText,
    location: &ClauseLocation,
    predicate: &str,
) -> Result<Injection, RejectKind> {
    if is_scoped(sql, predicate) {
        return Ok(Injection {
            statement: sql.clone(),
            already_scoped: true,
        });
    }

    let text = sql.as_str();
    let rewritten = match location.anchor {
        Some(where_clause) if where_clause.kind == ClauseKind::Where => {
            let body_end = where_body_end(sql, &where_clause);
            let body = text[where_clause.end..body_end].trim();
            if body.is_empty() {
                return Err(RejectKind::unparseable("WHERE without a condition"));
            }
            let mut out = format!("{} {predicate} AND ({body})", &text[..where_clause.end]);
            append_rest(&mut out, &text[body_end..]);
            out
        }
        _ => {
            let mut out = format!("{} WHERE {predicate}", text[..location.offset].trim_end());
            append_rest(&mut out, &text[location.offset..]);
            out
        }
    };

    let statement =
        SqlText::parse(rewritten).map_err(|_| RejectKind::InjectionVerificationFailed)?;
    if !is_scoped(&statement, predicate) {
        return Err(RejectKind::InjectionVerificationFailed);
    }

    Ok(Injection {
        statement,
        already_scoped: false,
    })
}

fn append_rest(out: &mut String, rest: &str) {
    let rest = rest.trim_start();
    if !rest.is_empty() {
        out.push(' ');
        out.push_str(rest);
    }
}

/// The top-level `WHERE` starts with `predicate` as a whole token sequence,
/// followed by nothing or by exactly one `AND ( ... )` group that closes the
/// `WHERE` body.
pub fn is_scoped(sql: &SqlText, predicate: &str) -> bool {
    let Some(where_clause) = find_clause(sql, ClauseKind::Where) else {
        return false;
    };
    let body_end = where_body_end(sql, &where_clause);
    let sig = sql.significant();
    let body: Vec<usize> = (0..sig.len())
        .filter(|&i| sig[i].start >= where_clause.end && sig[i].end <= body_end)
        .collect();

    let Some(&first) = body.first() else {
        return false;
    };
    let predicate_start = sig[first].start;
    let predicate_end = predicate_start + predicate.len();
    if !sql.as_str()[predicate_start..].starts_with(predicate) {
        return false;
    }

    // The literal closing the predicate must end exactly where it does.
    let Some(pos) = body
        .iter()
        .position(|&i| sig[i].kind == TokenKind::String && sig[i].end == predicate_end)
    else {
        return false;
    };

    match &body[pos + 1..] {
        [] => true,
        [and, open, .., close] => {
            sql.is_word(&sig[*and], "AND")
                && sig[*open].kind == TokenKind::LParen
                && sql.matching_paren(*open) == Some(*close)
        }
        _ => false,
    }
}
