//! Rejection reasons for the SQL guard.

use serde::Serialize;
use thiserror::Error;

/// Why a statement was refused.
///
/// Every variant is final for the request: the guard never rewrites a
/// rejected statement into an accepted one. Messages may contain fragments of
/// the statement and are meant for operators; use [`RejectKind::user_message`]
/// for anything shown to an end user.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectKind {
    /// Statement does not start with `SELECT`.
    #[error("only SELECT statements are allowed")]
    NotSelect,

    /// Statement contains a blocked keyword, catalog prefix or comment.
    #[error("statement contains forbidden keyword {keyword}")]
    ForbiddenKeyword { keyword: String },

    /// A `;` appears somewhere other than as the final terminator.
    #[error("multiple statements are not allowed")]
    MultipleStatements,

    /// The statement shape could not be determined.
    #[error("cannot determine statement shape: {reason}")]
    UnparseableStatement { reason: String },

    /// The tenant predicate was not found where it was injected.
    #[error("tenant predicate could not be verified after injection")]
    InjectionVerificationFailed,

    /// Query references a table outside the allowlist.
    #[error("access to table {table} is not allowed")]
    UnauthorizedTable { table: String },

    /// Tenant value missing or malformed.
    #[error("invalid tenant id: {reason}")]
    InvalidTenant { reason: String },
}

impl RejectKind {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotSelect => "NOT_SELECT",
            Self::ForbiddenKeyword { .. } => "FORBIDDEN_KEYWORD",
            Self::MultipleStatements => "MULTIPLE_STATEMENTS",
            Self::UnparseableStatement { .. } => "UNPARSEABLE_STATEMENT",
            Self::InjectionVerificationFailed => "INJECTION_VERIFICATION_FAILED",
            Self::UnauthorizedTable { .. } => "UNAUTHORIZED_TABLE",
            Self::InvalidTenant { .. } => "INVALID_TENANT",
        }
    }

    /// Generic message safe to show an end user. Never includes SQL,
    /// table names or the tenant id.
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidTenant { .. } => "Your session could not be verified. Please sign in again.",
            _ => "No data is available for that request.",
        }
    }

    pub(crate) fn unparseable(reason: impl Into<String>) -> Self {
        Self::UnparseableStatement {
            reason: reason.into(),
        }
    }

    pub(crate) fn forbidden(keyword: impl Into<String>) -> Self {
        Self::ForbiddenKeyword {
            keyword: keyword.into(),
        }
    }
}
