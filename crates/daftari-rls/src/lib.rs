//! # daftari-rls
//!
//! Tenant isolation for SQL written by a language model.
//!
//! The guard takes untrusted SQL and the authenticated tenant of the
//! session, and returns either a statement that can only read that tenant's
//! rows or a rejection. It never executes anything.
//!
//! ## How It Works
//!
//! **Before (from the model):**
//! ```sql
//! SELECT p.name, SUM(s.qty) FROM products p JOIN sales s ON s.product_id = p.id
//! WHERE s.sold_at > '2024-01-01' OR s.qty > 10 GROUP BY p.name
//! ```
//!
//! **After (to Postgres):**
//! ```sql
//! SELECT p.name, SUM(s.qty) FROM products p JOIN sales s ON s.product_id = p.id
//! WHERE p.business_id = 'b1' AND (s.sold_at > '2024-01-01' OR s.qty > 10)
//! GROUP BY p.name LIMIT 1000
//! ```
//!
//! ## Stages
//!
//! | Stage | Module | Rejects with |
//! |-------|--------|--------------|
//! | Classify | [`classifier`] | `NotSelect`, `ForbiddenKeyword`, `MultipleStatements` |
//! | Locate clause | [`clauses`] | |
//! | Resolve table | [`resolver`] | `UnparseableStatement` |
//! | Inject filter | [`injector`] | `InjectionVerificationFailed` |
//! | Allowlist | [`allowlist`] | `UnauthorizedTable` |
//! | Limit | [`limit`] | `UnparseableStatement` |
//! | Parse check (optional) | [`parser`] | any |
//!
//! ```
//! use daftari_rls::SqlGuard;
//!
//! let guard = SqlGuard::default();
//! let sql = guard.secure("SELECT * FROM sales", "b1")?;
//! assert_eq!(sql, "SELECT * FROM sales WHERE sales.business_id = 'b1' LIMIT 1000");
//! # Ok::<(), daftari_rls::RejectKind>(())
//! ```

pub mod allowlist;
pub mod classifier;
pub mod clauses;
pub mod error;
pub mod guard;
pub mod injector;
pub mod lexer;
pub mod limit;
pub mod parser;
pub mod resolver;

pub use clauses::{ClauseKind, ClauseLocation};
pub use error::RejectKind;
pub use guard::{SecuringOutcome, SecuringReport, SecuringRequest, SqlGuard, Stage};
pub use lexer::{LexError, SqlText};
pub use limit::LimitAction;
pub use parser::SqlAnalyzer;
pub use resolver::TableRef;
