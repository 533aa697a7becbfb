//! Audit event types.
//!
//! One event is recorded per securing decision: the statement the model
//! produced, the tenant it ran for, and either the secured statement or the
//! reason it was refused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters of SQL shown in console lines.
const SQL_PREVIEW_CHARS: usize = 100;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Statement was secured and handed back for execution.
    QuerySecured,
    /// Statement was refused.
    QueryRejected,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuerySecured => write!(f, "QUERY_SECURED"),
            Self::QueryRejected => write!(f, "QUERY_REJECTED"),
        }
    }
}

/// An audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Event type.
    pub event_type: AuditEventType,

    /// Tenant the statement was secured for.
    pub tenant_id: String,

    /// Statement as produced by the model.
    pub original_sql: String,

    /// Statement after securing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secured_sql: Option<String>,

    /// Tables referenced by the statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,

    /// Statement already carried the tenant filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub already_scoped: Option<bool>,

    /// Stable rejection code (e.g. `UNAUTHORIZED_TABLE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_code: Option<String>,

    /// Operator-facing rejection message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Chat session the statement came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Correlation ID linking this event to the caller's request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Additional metadata.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl AuditEvent {
    /// Create a new audit event with the given type and core fields.
    pub fn new(
        event_type: AuditEventType,
        tenant_id: impl Into<String>,
        original_sql: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type,
            tenant_id: tenant_id.into(),
            original_sql: original_sql.into(),
            secured_sql: None,
            tables: None,
            already_scoped: None,
            reject_code: None,
            error: None,
            session_id: None,
            correlation_id: None,
            meta: serde_json::Value::Null,
        }
    }

    /// Create a builder for an audit event.
    pub fn builder(
        event_type: AuditEventType,
        tenant_id: impl Into<String>,
        original_sql: impl Into<String>,
    ) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type, tenant_id, original_sql)
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] EVENT_TYPE tenant=... [session=...] sql="..." [code=...]`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} tenant={}",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event_type,
            self.tenant_id,
        );

        if let Some(ref session) = self.session_id {
            line.push_str(&format!(" session={session}"));
        }

        let sql = self.secured_sql.as_deref().unwrap_or(&self.original_sql);
        line.push_str(&format!(" sql=\"{}\"", sql_preview(sql)));

        if let Some(ref tables) = self.tables {
            line.push_str(&format!(" tables=[{}]", tables.join(",")));
        }

        if let Some(ref code) = self.reject_code {
            line.push_str(&format!(" code={code}"));
        }

        if let Some(ref error) = self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }

        line
    }
}

fn sql_preview(sql: &str) -> String {
    let flat = sql.replace('\n', " ");
    if flat.chars().count() > SQL_PREVIEW_CHARS {
        let head: String = flat.chars().take(SQL_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        flat
    }
}

/// Builder for creating audit events.
#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    /// Create a new builder with required fields.
    pub fn new(
        event_type: AuditEventType,
        tenant_id: impl Into<String>,
        original_sql: impl Into<String>,
    ) -> Self {
        Self {
            event: AuditEvent::new(event_type, tenant_id, original_sql),
        }
    }

    pub fn secured_sql(mut self, sql: impl Into<String>) -> Self {
        self.event.secured_sql = Some(sql.into());
        self
    }

    pub fn tables(mut self, tables: Vec<String>) -> Self {
        self.event.tables = Some(tables);
        self
    }

    pub fn already_scoped(mut self, already_scoped: bool) -> Self {
        self.event.already_scoped = Some(already_scoped);
        self
    }

    /// Set the rejection code and message.
    pub fn rejection(mut self, code: impl Into<String>, error: impl Into<String>) -> Self {
        self.event.reject_code = Some(code.into());
        self.event.error = Some(error.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.event.session_id = Some(session_id.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.event.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.event.meta = meta;
        self
    }

    /// Build the audit event.
    pub fn build(self) -> AuditEvent {
        self.event
    }
}
