//! Top-level clause location.
//!
//! Finds where a filter belongs in a statement: at its first top-level
//! `WHERE`, `GROUP BY`, `HAVING`, `ORDER BY`, `LIMIT` or `OFFSET`, or at the
//! end when none is present. Only keywords outside parentheses count, so
//! subqueries and window definitions never move the anchor.

use serde::Serialize;
use std::fmt;

use crate::lexer::{SqlText, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClauseKind {
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
}

impl ClauseKind {
    /// Order in which anchors are considered.
    pub const PRECEDENCE: [ClauseKind; 6] = [
        ClauseKind::Where,
        ClauseKind::GroupBy,
        ClauseKind::Having,
        ClauseKind::OrderBy,
        ClauseKind::Limit,
        ClauseKind::Offset,
    ];

    pub const fn keyword(&self) -> &'static str {
        match self {
            ClauseKind::Where => "WHERE",
            ClauseKind::GroupBy => "GROUP BY",
            ClauseKind::Having => "HAVING",
            ClauseKind::OrderBy => "ORDER BY",
            ClauseKind::Limit => "LIMIT",
            ClauseKind::Offset => "OFFSET",
        }
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A clause keyword found at the top level. `start..end` spans the keyword
/// itself (both words for `GROUP BY` / `ORDER BY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClauseMatch {
    pub kind: ClauseKind,
    pub start: usize,
    pub end: usize,
}

/// Where the tenant filter goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClauseLocation {
    /// Byte offset of the anchor keyword, or the statement length.
    pub offset: usize,
    /// The anchor clause, `None` for end of statement.
    pub anchor: Option<ClauseMatch>,
}

impl ClauseLocation {
    pub fn anchor_kind(&self) -> Option<ClauseKind> {
        self.anchor.map(|m| m.kind)
    }

    /// The filter is merged into an existing `WHERE` rather than inserted.
    pub fn merges_into_where(&self) -> bool {
        self.anchor_kind() == Some(ClauseKind::Where)
    }
}

/// Every top-level clause keyword, in document order.
pub fn top_level_clauses(sql: &SqlText) -> Vec<ClauseMatch> {
    let sig = sql.significant();
    let mut found = Vec::new();

    for (i, token) in sig.iter().enumerate() {
        if token.depth != 0 || token.kind != TokenKind::Word {
            continue;
        }
        let followed_by_by = sig.get(i + 1).filter(|next| sql.is_word(next, "BY"));
        let (kind, end) = match sql.text(token).to_ascii_uppercase().as_str() {
            "WHERE" => (ClauseKind::Where, token.end),
            "HAVING" => (ClauseKind::Having, token.end),
            "LIMIT" => (ClauseKind::Limit, token.end),
            "OFFSET" => (ClauseKind::Offset, token.end),
            "GROUP" => match followed_by_by {
                Some(by) => (ClauseKind::GroupBy, by.end),
                None => continue,
            },
            "ORDER" => match followed_by_by {
                Some(by) => (ClauseKind::OrderBy, by.end),
                None => continue,
            },
            _ => continue,
        };
        found.push(ClauseMatch {
            kind,
            start: token.start,
            end,
        });
    }

    found
}

/// First top-level occurrence of `kind`.
pub fn find_clause(sql: &SqlText, kind: ClauseKind) -> Option<ClauseMatch> {
    top_level_clauses(sql).into_iter().find(|m| m.kind == kind)
}

/// Locate the filter anchor: the earliest clause in [`ClauseKind::PRECEDENCE`]
/// present at the top level, or the end of the statement.
pub fn locate(sql: &SqlText) -> ClauseLocation {
    let clauses = top_level_clauses(sql);
    let anchor = ClauseKind::PRECEDENCE
        .iter()
        .filter_map(|kind| clauses.iter().find(|m| m.kind == *kind))
        .min_by_key(|m| m.start)
        .copied();

    ClauseLocation {
        offset: anchor.map_or(sql.as_str().len(), |m| m.start),
        anchor,
    }
}

/// End of a `WHERE` body: the next top-level clause after it, or the end of
/// the statement.
pub fn where_body_end(sql: &SqlText, where_clause: &ClauseMatch) -> usize {
    top_level_clauses(sql)
        .into_iter()
        .find(|m| m.start > where_clause.end && m.kind != ClauseKind::Where)
        .map_or(sql.as_str().len(), |m| m.start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn anchor(sql: &str) -> (Option<ClauseKind>, String) {
        let sql = SqlText::parse(sql).unwrap();
        let location = locate(&sql);
        (
            location.anchor_kind(),
            sql.as_str()[location.offset..].to_string(),
        )
    }

    #[test]
    fn test_no_clause_anchors_at_end() {
        assert_eq!(anchor("SELECT * FROM products"), (None, String::new()));
    }

    #[test]
    fn test_where_wins() {
        assert_eq!(
            anchor("SELECT * FROM sales WHERE total > 5 ORDER BY total"),
            (
                Some(ClauseKind::Where),
                "WHERE total > 5 ORDER BY total".to_string()
            )
        );
    }

    #[test]
    fn test_earliest_clause_without_where() {
        assert_eq!(
            anchor("SELECT product_id, SUM(qty) FROM sales GROUP BY product_id ORDER BY 2 LIMIT 5"),
            (
                Some(ClauseKind::GroupBy),
                "GROUP BY product_id ORDER BY 2 LIMIT 5".to_string()
            )
        );
        assert_eq!(
            anchor("SELECT * FROM sales LIMIT 5 OFFSET 10"),
            (Some(ClauseKind::Limit), "LIMIT 5 OFFSET 10".to_string())
        );
    }

    #[test]
    fn test_nested_clauses_are_ignored() {
        assert_eq!(
            anchor("SELECT *, ROW_NUMBER() OVER (ORDER BY total) FROM sales"),
            (None, String::new())
        );
        assert_eq!(
            anchor("SELECT * FROM sales s WHERE s.id IN (SELECT id FROM products WHERE x = 1 LIMIT 3) ORDER BY 1"),
            (
                Some(ClauseKind::Where),
                "WHERE s.id IN (SELECT id FROM products WHERE x = 1 LIMIT 3) ORDER BY 1".to_string()
            )
        );
    }

    #[test]
    fn test_keywords_in_literals_are_ignored() {
        assert_eq!(
            anchor("SELECT * FROM expenses WHERE note = 'ORDER BY' LIMIT 3"),
            (
                Some(ClauseKind::Where),
                "WHERE note = 'ORDER BY' LIMIT 3".to_string()
            )
        );
    }

    #[test]
    fn test_within_group_is_not_group_by() {
        assert_eq!(
            anchor("SELECT percentile_cont(0.5) WITHIN GROUP (ORDER BY total) FROM sales"),
            (None, String::new())
        );
    }

    #[test]
    fn test_where_body_end() {
        let sql = SqlText::parse("SELECT * FROM sales WHERE a = 1 OR b = 2 GROUP BY a").unwrap();
        let where_clause = find_clause(&sql, ClauseKind::Where).unwrap();
        let end = where_body_end(&sql, &where_clause);
        assert_eq!(&sql.as_str()[where_clause.end..end], " a = 1 OR b = 2 ");
    }
}
