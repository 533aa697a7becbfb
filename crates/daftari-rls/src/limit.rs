//! Row limit enforcement.

use daftari_core::GuardConfig;
use serde::Serialize;

use crate::clauses::{find_clause, ClauseKind};
use crate::error::RejectKind;
use crate::lexer::{SqlText, TokenKind};

/// What the enforcer did to the statement's `LIMIT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LimitAction {
    /// An acceptable explicit limit was left as written.
    Kept,
    /// No limit was present; the default was appended.
    Appended { limit: u64 },
    /// An explicit limit above the maximum was replaced.
    Clamped { from: String, to: u64 },
}

/// Ensure the statement carries a bounded top-level `LIMIT`.
pub fn enforce(sql: &SqlText, config: &GuardConfig) -> Result<(SqlText, LimitAction), RejectKind> {
    let Some(limit) = find_clause(sql, ClauseKind::Limit) else {
        let text = format!("{} LIMIT {}", sql.as_str(), config.default_limit);
        let statement = reparse(text)?;
        return Ok((
            statement,
            LimitAction::Appended {
                limit: config.default_limit,
            },
        ));
    };

    if !config.clamp_explicit_limit {
        return Ok((sql.clone(), LimitAction::Kept));
    }

    let sig = sql.significant();
    let Some(pos) = sig.iter().position(|t| t.start == limit.start) else {
        return Err(RejectKind::unparseable("LIMIT keyword not found"));
    };
    let value = sig
        .get(pos + 1)
        .ok_or_else(|| RejectKind::unparseable("LIMIT without a value"))?;
    let literal_ends = sig
        .get(pos + 2)
        .is_none_or(|t| t.depth == 0 && sql.is_word(t, "OFFSET"));

    let written = sql.text(value);
    let too_large = match value.kind {
        TokenKind::Number if literal_ends => match written.parse::<u64>() {
            Ok(n) => n > config.max_limit,
            // Digits too large for u64.
            Err(_) if written.bytes().all(|b| b.is_ascii_digit()) => true,
            Err(_) => {
                return Err(RejectKind::unparseable(format!(
                    "LIMIT {written} is not a whole number"
                )));
            }
        },
        TokenKind::Word if literal_ends && written.eq_ignore_ascii_case("ALL") => true,
        _ => {
            return Err(RejectKind::unparseable(
                "LIMIT must be a numeric literal",
            ));
        }
    };

    if !too_large {
        return Ok((sql.clone(), LimitAction::Kept));
    }

    let text = sql.as_str();
    let clamped = format!(
        "{}{}{}",
        &text[..value.start],
        config.max_limit,
        &text[value.end..]
    );
    let statement = reparse(clamped)?;
    Ok((
        statement,
        LimitAction::Clamped {
            from: written.to_string(),
            to: config.max_limit,
        },
    ))
}

fn reparse(text: String) -> Result<SqlText, RejectKind> {
    SqlText::parse(text).map_err(|e| RejectKind::unparseable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(sql: &str) -> Result<(String, LimitAction), RejectKind> {
        run_with(sql, &GuardConfig::default())
    }

    fn run_with(sql: &str, config: &GuardConfig) -> Result<(String, LimitAction), RejectKind> {
        enforce(&SqlText::parse(sql).unwrap(), config).map(|(s, a)| (s.into_string(), a))
    }

    #[test]
    fn test_appends_default() {
        assert_eq!(
            run("SELECT * FROM sales ORDER BY total").unwrap(),
            (
                "SELECT * FROM sales ORDER BY total LIMIT 1000".to_string(),
                LimitAction::Appended { limit: 1000 }
            )
        );
    }

    #[test]
    fn test_keeps_small_limit() {
        assert_eq!(
            run("SELECT * FROM sales LIMIT 5").unwrap(),
            ("SELECT * FROM sales LIMIT 5".to_string(), LimitAction::Kept)
        );
        assert_eq!(
            run("SELECT * FROM sales LIMIT 10 OFFSET 20").unwrap().1,
            LimitAction::Kept
        );
    }

    #[test]
    fn test_nested_limit_does_not_count() {
        assert_eq!(
            run("SELECT * FROM sales WHERE id IN (SELECT id FROM products LIMIT 3)")
                .unwrap()
                .1,
            LimitAction::Appended { limit: 1000 }
        );
    }

    #[test]
    fn test_clamps_large_limit() {
        assert_eq!(
            run("SELECT * FROM sales LIMIT 50000 OFFSET 5").unwrap(),
            (
                "SELECT * FROM sales LIMIT 10000 OFFSET 5".to_string(),
                LimitAction::Clamped {
                    from: "50000".to_string(),
                    to: 10000
                }
            )
        );
        assert_eq!(
            run("SELECT * FROM sales LIMIT 99999999999999999999999").unwrap().0,
            "SELECT * FROM sales LIMIT 10000"
        );
        assert_eq!(
            run("SELECT * FROM sales LIMIT ALL").unwrap().0,
            "SELECT * FROM sales LIMIT 10000"
        );
    }

    #[test]
    fn test_rejects_non_literal_limit() {
        for sql in [
            "SELECT * FROM sales LIMIT 5 + 100000",
            "SELECT * FROM sales LIMIT (SELECT 100000)",
            "SELECT * FROM sales LIMIT $1",
            "SELECT * FROM sales LIMIT 1.5",
            "SELECT * FROM sales LIMIT",
        ] {
            assert!(
                matches!(run(sql), Err(RejectKind::UnparseableStatement { .. })),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_clamping_disabled_keeps_limit() {
        let config = GuardConfig {
            clamp_explicit_limit: false,
            ..Default::default()
        };
        assert_eq!(
            run_with("SELECT * FROM sales LIMIT 50000", &config).unwrap(),
            ("SELECT * FROM sales LIMIT 50000".to_string(), LimitAction::Kept)
        );
    }
}
