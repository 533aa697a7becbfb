//! SQL token stream.
//!
//! Every stage of the guard works on tokens rather than raw text so that
//! keywords inside string literals, quoted identifiers or comments are never
//! mistaken for structure. Tokenization is done by the `sqlparser`
//! tokenizer with the PostgreSQL dialect; this module maps its tokens back to
//! byte spans of the original text and adds two annotations per token: its
//! parenthesis depth and whether its innermost group is the argument list of
//! a function that uses `FROM` as an argument separator (`EXTRACT`,
//! `SUBSTRING`, `TRIM`, `OVERLAY`).

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Location, Token as SqlToken, Tokenizer, Whitespace};
use thiserror::Error;

/// Functions whose argument syntax contains `FROM`.
const FROM_ARGUMENT_FUNCTIONS: &[&str] = &["EXTRACT", "SUBSTRING", "TRIM", "OVERLAY"];

/// Errors raised when statement text cannot be tokenized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("{0}")]
    Tokenize(String),

    #[error("unbalanced parentheses")]
    UnbalancedParens,

    #[error("dollar-quoted strings are not supported")]
    DollarQuote,

    #[error("unsupported literal {0}")]
    UnsupportedLiteral(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Unquoted identifier or keyword.
    Word,
    /// `"identifier"`.
    QuotedIdent,
    /// Any string literal, prefix included (`E'...'`, `N'...'`, `U&'...'`).
    String,
    Number,
    LParen,
    RParen,
    /// Operators and punctuation. Multi-character operators (`::`, `<=`)
    /// and `$1` style placeholders are a single symbol.
    Symbol,
    Whitespace,
    LineComment,
    BlockComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// Parenthesis depth. Parentheses themselves carry the depth outside them.
    pub depth: usize,
    /// Innermost enclosing group is the argument list of one of
    /// `EXTRACT`, `SUBSTRING`, `TRIM` or `OVERLAY`.
    pub in_from_call: bool,
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

/// Statement text together with its tokens.
#[derive(Debug, Clone)]
pub struct SqlText {
    text: String,
    tokens: Vec<Token>,
    significant: Vec<Token>,
}

impl SqlText {
    /// Tokenize `text`.
    pub fn parse(text: impl Into<String>) -> Result<Self, LexError> {
        let text = text.into();
        let mut tokens = tokenize(&text)?;
        mark_groups(&text, &mut tokens)?;
        let significant = tokens.iter().copied().filter(|t| !t.is_trivia()).collect();
        Ok(Self {
            text,
            tokens,
            significant,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// All tokens, including whitespace and comments.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Tokens with whitespace and comments removed.
    pub fn significant(&self) -> &[Token] {
        &self.significant
    }

    pub fn text(&self, token: &Token) -> &str {
        &self.text[token.start..token.end]
    }

    /// Case-insensitive keyword test.
    pub fn is_word(&self, token: &Token, word: &str) -> bool {
        token.kind == TokenKind::Word && self.text(token).eq_ignore_ascii_case(word)
    }

    pub fn is_symbol(&self, token: &Token, symbol: char) -> bool {
        let text = self.text(token);
        token.kind == TokenKind::Symbol
            && text.len() == symbol.len_utf8()
            && text.starts_with(symbol)
    }

    /// Identifier value of a word or quoted identifier, without quotes.
    pub fn identifier(&self, token: &Token) -> Option<String> {
        match token.kind {
            TokenKind::Word => Some(self.text(token).to_string()),
            TokenKind::QuotedIdent => {
                let raw = self.text(token);
                let open = raw.find('"')?;
                let close = raw.rfind('"').filter(|&close| close > open)?;
                Some(raw[open + 1..close].replace("\"\"", "\""))
            }
            _ => None,
        }
    }

    /// Index in [`Self::significant`] of the parenthesis closing the group
    /// opened at `open`.
    pub fn matching_paren(&self, open: usize) -> Option<usize> {
        let sig = &self.significant;
        let depth = sig.get(open).filter(|t| t.kind == TokenKind::LParen)?.depth;
        (open + 1..sig.len()).find(|&i| sig[i].kind == TokenKind::RParen && sig[i].depth == depth)
    }
}

/// Converts tokenizer locations (1-based line and column, counted in
/// characters) to byte offsets. Locations must be visited in order.
struct OffsetCursor<'a> {
    text: &'a str,
    offset: usize,
    line: u64,
    column: u64,
}

impl<'a> OffsetCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn seek(&mut self, target: Location) -> usize {
        while (self.line, self.column) < (target.line, target.column) {
            let Some(ch) = self.text[self.offset..].chars().next() else {
                break;
            };
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    let dialect = PostgreSqlDialect {};
    let raw = Tokenizer::new(&dialect, text)
        .tokenize_with_location()
        .map_err(|e| LexError::Tokenize(e.to_string()))?;

    let mut cursor = OffsetCursor::new(text);
    let mut tokens = Vec::with_capacity(raw.len());
    for item in &raw {
        let start = cursor.seek(item.span.start);
        let end = cursor.seek(item.span.end);
        tokens.push(Token {
            kind: token_kind(&item.token, &text[start..end])?,
            start,
            end,
            depth: 0,
            in_from_call: false,
        });
    }
    Ok(tokens)
}

fn token_kind(token: &SqlToken, written: &str) -> Result<TokenKind, LexError> {
    let kind = match token {
        SqlToken::Word(word) if word.quote_style.is_some() => TokenKind::QuotedIdent,
        SqlToken::Word(_) => TokenKind::Word,
        SqlToken::Number(..) => TokenKind::Number,
        SqlToken::SingleQuotedString(_)
        | SqlToken::EscapedStringLiteral(_)
        | SqlToken::NationalStringLiteral(_)
        | SqlToken::UnicodeStringLiteral(_)
        | SqlToken::HexStringLiteral(_)
        | SqlToken::SingleQuotedByteStringLiteral(_) => TokenKind::String,
        SqlToken::DollarQuotedString(_) => return Err(LexError::DollarQuote),
        SqlToken::DoubleQuotedString(_)
        | SqlToken::TripleSingleQuotedString(_)
        | SqlToken::TripleDoubleQuotedString(_)
        | SqlToken::DoubleQuotedByteStringLiteral(_)
        | SqlToken::TripleSingleQuotedByteStringLiteral(_)
        | SqlToken::TripleDoubleQuotedByteStringLiteral(_)
        | SqlToken::SingleQuotedRawStringLiteral(_)
        | SqlToken::DoubleQuotedRawStringLiteral(_)
        | SqlToken::TripleSingleQuotedRawStringLiteral(_)
        | SqlToken::TripleDoubleQuotedRawStringLiteral(_) => {
            return Err(LexError::UnsupportedLiteral(written.to_string()));
        }
        SqlToken::LParen => TokenKind::LParen,
        SqlToken::RParen => TokenKind::RParen,
        SqlToken::Whitespace(Whitespace::SingleLineComment { .. }) => TokenKind::LineComment,
        SqlToken::Whitespace(Whitespace::MultiLineComment(_)) => TokenKind::BlockComment,
        SqlToken::Whitespace(_) => TokenKind::Whitespace,
        _ => TokenKind::Symbol,
    };
    Ok(kind)
}

/// Fill in depth and call-group marks, rejecting unbalanced parentheses.
fn mark_groups(text: &str, tokens: &mut [Token]) -> Result<(), LexError> {
    let mut stack: Vec<bool> = Vec::new();
    let mut previous_word: Option<usize> = None;

    for idx in 0..tokens.len() {
        let current = stack.last().copied().unwrap_or(false);
        let opens_call = previous_word.is_some_and(|w| {
            let name = &text[tokens[w].start..tokens[w].end];
            FROM_ARGUMENT_FUNCTIONS
                .iter()
                .any(|f| f.eq_ignore_ascii_case(name))
        });
        let token = &mut tokens[idx];
        match token.kind {
            TokenKind::LParen => {
                token.depth = stack.len();
                token.in_from_call = current;
                stack.push(opens_call);
            }
            TokenKind::RParen => {
                stack.pop().ok_or(LexError::UnbalancedParens)?;
                token.depth = stack.len();
                token.in_from_call = stack.last().copied().unwrap_or(false);
            }
            _ => {
                token.depth = stack.len();
                token.in_from_call = current;
            }
        }

        let token = tokens[idx];
        if !token.is_trivia() {
            previous_word = (token.kind == TokenKind::Word).then_some(idx);
        }
    }

    if !stack.is_empty() {
        return Err(LexError::UnbalancedParens);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(sql: &SqlText) -> Vec<(TokenKind, &str)> {
        sql.significant()
            .iter()
            .map(|t| (t.kind, sql.text(t)))
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        let sql = SqlText::parse("SELECT name, 10 FROM products").unwrap();
        assert_eq!(
            kinds(&sql),
            vec![
                (TokenKind::Word, "SELECT"),
                (TokenKind::Word, "name"),
                (TokenKind::Symbol, ","),
                (TokenKind::Number, "10"),
                (TokenKind::Word, "FROM"),
                (TokenKind::Word, "products"),
            ]
        );
    }

    #[test]
    fn test_keyword_glued_to_number_is_a_word() {
        let sql = SqlText::parse("SELECT 1 WHERE 1=1UNION SELECT 2FROM x").unwrap();
        assert_eq!(
            kinds(&sql),
            vec![
                (TokenKind::Word, "SELECT"),
                (TokenKind::Number, "1"),
                (TokenKind::Word, "WHERE"),
                (TokenKind::Number, "1"),
                (TokenKind::Symbol, "="),
                (TokenKind::Number, "1"),
                (TokenKind::Word, "UNION"),
                (TokenKind::Word, "SELECT"),
                (TokenKind::Number, "2"),
                (TokenKind::Word, "FROM"),
                (TokenKind::Word, "x"),
            ]
        );
    }

    #[test]
    fn test_keywords_inside_literals_are_not_words() {
        let sql = SqlText::parse("SELECT 'DROP TABLE x; --' AS \"where\"").unwrap();
        assert_eq!(
            kinds(&sql),
            vec![
                (TokenKind::Word, "SELECT"),
                (TokenKind::String, "'DROP TABLE x; --'"),
                (TokenKind::Word, "AS"),
                (TokenKind::QuotedIdent, "\"where\""),
            ]
        );
    }

    #[test]
    fn test_doubled_quotes_stay_in_literal() {
        let sql = SqlText::parse("SELECT 'it''s' FROM sales").unwrap();
        assert_eq!(sql.text(&sql.significant()[1]), "'it''s'");
    }

    #[test]
    fn test_escape_string_honours_backslash() {
        let sql = SqlText::parse(r"SELECT E'\'' , 1").unwrap();
        let sig = sql.significant();
        assert_eq!(kinds(&sql)[1], (TokenKind::String, r"E'\''"));
        assert!(sql.is_symbol(&sig[2], ','));
    }

    #[test]
    fn test_spans_survive_multibyte_text_and_newlines() {
        let sql = SqlText::parse("SELECT 'né'\r\n, \"Ä\" FROM t").unwrap();
        assert_eq!(
            kinds(&sql),
            vec![
                (TokenKind::Word, "SELECT"),
                (TokenKind::String, "'né'"),
                (TokenKind::Symbol, ","),
                (TokenKind::QuotedIdent, "\"Ä\""),
                (TokenKind::Word, "FROM"),
                (TokenKind::Word, "t"),
            ]
        );
        let rebuilt: String = sql.tokens().iter().map(|t| sql.text(t)).collect();
        assert_eq!(rebuilt, sql.as_str());
    }

    #[test]
    fn test_comments() {
        let sql = SqlText::parse("SELECT 1 -- trailing\n/* block */").unwrap();
        let comments: Vec<_> = sql
            .tokens()
            .iter()
            .filter(|t| t.is_comment())
            .map(|t| sql.text(t).trim_end())
            .collect();
        assert_eq!(comments, vec!["-- trailing", "/* block */"]);
    }

    #[test]
    fn test_depth_and_call_groups() {
        let sql = SqlText::parse(
            "SELECT EXTRACT(YEAR FROM d) FROM sales WHERE id IN (SELECT id FROM products) \
             AND n = SUBSTRING((SELECT x FROM t) FROM 2)",
        )
        .unwrap();
        let froms: Vec<_> = sql
            .significant()
            .iter()
            .filter(|t| sql.is_word(t, "FROM"))
            .map(|t| (t.depth, t.in_from_call))
            .collect();
        assert_eq!(
            froms,
            vec![(1, true), (0, false), (1, false), (2, false), (1, true)]
        );
    }

    #[test]
    fn test_matching_paren() {
        let sql = SqlText::parse("SELECT (a + (b)) FROM t").unwrap();
        assert_eq!(sql.matching_paren(1), Some(7));
        assert_eq!(sql.matching_paren(0), None);
    }

    #[test]
    fn test_unquoted_identifier() {
        let sql = SqlText::parse(r#"SELECT "say ""hi""""#).unwrap();
        assert_eq!(
            sql.identifier(&sql.significant()[1]).as_deref(),
            Some(r#"say "hi""#)
        );
    }

    #[test]
    fn test_lex_errors() {
        for sql in ["SELECT 'open", "SELECT \"open", "SELECT 1 /* open"] {
            assert!(
                matches!(SqlText::parse(sql), Err(LexError::Tokenize(_))),
                "{sql}"
            );
        }
        assert_eq!(
            SqlText::parse("SELECT (1").unwrap_err(),
            LexError::UnbalancedParens
        );
        assert_eq!(
            SqlText::parse("SELECT 1)").unwrap_err(),
            LexError::UnbalancedParens
        );
        assert_eq!(
            SqlText::parse("SELECT $$x$$").unwrap_err(),
            LexError::DollarQuote
        );
        assert_eq!(
            SqlText::parse("SELECT $tag$x$tag$").unwrap_err(),
            LexError::DollarQuote
        );
    }

    #[test]
    fn test_placeholder_is_allowed() {
        let sql = SqlText::parse("SELECT $1").unwrap();
        assert_eq!(kinds(&sql)[1], (TokenKind::Symbol, "$1"));
    }
}
