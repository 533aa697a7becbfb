//! # daftari-audit
//!
//! Audit trail for the SQL guard.
//!
//! Every securing decision can be recorded: what the model wrote, which
//! tenant it was for, and either the statement that was handed back or the
//! reason it was refused.
//!
//! - **File output**: JSON Lines (one JSON object per line), read back on query
//! - **Console output**: Human-readable log lines on stderr
//!
//! ## Event Types
//!
//! | Event Type | Description |
//! |------------|-------------|
//! | `QuerySecured` | Statement was secured |
//! | `QueryRejected` | Statement was refused, with its reject code |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use daftari_audit::AuditLogger;
//! use daftari_core::AuditConfig;
//! use daftari_rls::SqlGuard;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = AuditLogger::new(AuditConfig::default())?;
//! let guard = SqlGuard::default();
//!
//! let raw = "SELECT * FROM sales";
//! let outcome = guard.explain(raw, "b1");
//! logger.log_outcome("b1", raw, &outcome, Some("chat-1")).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType};
pub use logger::{AuditFilter, AuditLogger, AUDIT_FILE_NAME};
pub use storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};
