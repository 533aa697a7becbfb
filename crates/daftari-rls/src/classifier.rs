//! Statement classification.
//!
//! Decides whether model output is a single read-only `SELECT` worth
//! securing, and produces the normalized text every later stage works on.

use daftari_core::GuardConfig;

use crate::error::RejectKind;
use crate::lexer::{SqlText, TokenKind};

/// Classify raw model output.
///
/// Checks run in a fixed order: `SELECT` prefix, forbidden keywords and
/// comments, then statement count. On success the returned text has code
/// fences removed, whitespace runs outside literals collapsed to one space,
/// and a single trailing `;` dropped.
pub fn classify(raw_sql: &str, config: &GuardConfig) -> Result<SqlText, RejectKind> {
    let stripped = strip_code_fences(raw_sql);
    if !starts_with_select(stripped) {
        return Err(RejectKind::NotSelect);
    }

    let lexed = SqlText::parse(stripped).map_err(|e| RejectKind::unparseable(e.to_string()))?;
    check_forbidden(&lexed, config)?;

    let normalized = collapse_whitespace(&lexed);
    let statement =
        SqlText::parse(normalized).map_err(|e| RejectKind::unparseable(e.to_string()))?;
    strip_terminator(statement)
}

/// Remove a Markdown code fence around the statement, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.get(..3) {
            Some(tag) if tag.eq_ignore_ascii_case("sql") => &rest[3..],
            _ => rest,
        };
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn starts_with_select(text: &str) -> bool {
    let word_end = text
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    text[..word_end].eq_ignore_ascii_case("SELECT")
}

fn check_forbidden(sql: &SqlText, config: &GuardConfig) -> Result<(), RejectKind> {
    for token in sql.tokens() {
        match token.kind {
            TokenKind::LineComment => return Err(RejectKind::forbidden("--")),
            TokenKind::BlockComment => return Err(RejectKind::forbidden("/*")),
            TokenKind::Word | TokenKind::QuotedIdent => {
                let Some(name) = sql.identifier(token) else {
                    continue;
                };
                let upper = name.to_ascii_uppercase();
                if let Some(keyword) = config
                    .blocked_keywords
                    .iter()
                    .find(|k| k.eq_ignore_ascii_case(&upper))
                {
                    return Err(RejectKind::forbidden(keyword.to_ascii_uppercase()));
                }
                if let Some(prefix) = config
                    .blocked_prefixes
                    .iter()
                    .find(|p| upper.starts_with(&p.to_ascii_uppercase()))
                {
                    return Err(RejectKind::forbidden(prefix.to_ascii_uppercase()));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn collapse_whitespace(sql: &SqlText) -> String {
    let mut out = String::with_capacity(sql.as_str().len());
    let mut in_run = false;
    for token in sql.tokens() {
        if token.kind == TokenKind::Whitespace {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push_str(sql.text(token));
            in_run = false;
        }
    }
    out.trim().to_string()
}

fn strip_terminator(statement: SqlText) -> Result<SqlText, RejectKind> {
    let sig = statement.significant();
    let Some(last) = sig.len().checked_sub(1) else {
        return Err(RejectKind::NotSelect);
    };
    if sig[..last].iter().any(|t| statement.is_symbol(t, ';')) {
        return Err(RejectKind::MultipleStatements);
    }
    if !statement.is_symbol(&sig[last], ';') {
        return Ok(statement);
    }

    let trimmed = statement.as_str()[..sig[last].start].trim_end().to_string();
    SqlText::parse(trimmed).map_err(|e| RejectKind::unparseable(e.to_string()))
}
