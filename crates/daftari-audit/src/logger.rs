//! Audit logger implementation.
//!
//! Provides the main `AuditLogger` type with helpers for recording secured
//! and rejected statements.

use daftari_core::AuditConfig;
use daftari_rls::{RejectKind, SecuringReport};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventType};
use crate::storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};

/// File name of the JSON Lines log inside the audit directory.
pub const AUDIT_FILE_NAME: &str = "audit.log";

/// The main audit logger.
pub struct AuditLogger {
    config: AuditConfig,
    storage: Arc<dyn AuditStorage>,
}

impl AuditLogger {
    /// Create a new audit logger with the given configuration.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let storage: Arc<dyn AuditStorage> = if !config.enabled {
            Arc::new(NullStorage::new())
        } else {
            let file_path = Self::resolve_log_path(&config);

            if config.stdout {
                Arc::new(DualStorage::new(&file_path)?)
            } else {
                Arc::new(FileStorage::new(&file_path)?)
            }
        };

        Ok(Self { config, storage })
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(config: AuditConfig, storage: Arc<dyn AuditStorage>) -> Self {
        Self { config, storage }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self {
            config: AuditConfig {
                enabled: false,
                ..Default::default()
            },
            storage: Arc::new(NullStorage::new()),
        }
    }

    /// Create a console-only logger (useful for development).
    pub fn console_only() -> Self {
        Self {
            config: AuditConfig {
                enabled: true,
                stdout: true,
                ..Default::default()
            },
            storage: Arc::new(ConsoleStorage::new()),
        }
    }

    /// Path of the audit file for a configuration.
    pub fn resolve_log_path(config: &AuditConfig) -> PathBuf {
        let mut path = PathBuf::from(&config.directory);
        path.push(AUDIT_FILE_NAME);
        path
    }

    /// Check if logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Log an audit event.
    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        if !self.config.enabled {
            return Ok(());
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            tenant = %event.tenant_id,
            "Audit event"
        );

        self.storage.store(event).await
    }

    /// Record a secured statement.
    pub async fn log_secured(
        &self,
        report: &SecuringReport,
        session_id: Option<&str>,
    ) -> Result<(), AuditError> {
        if !self.config.log_secured {
            return Ok(());
        }

        let tables = report
            .tables
            .iter()
            .map(|t| t.reference.clone())
            .collect();
        let mut builder = AuditEvent::builder(
            AuditEventType::QuerySecured,
            &report.tenant_id,
            &report.original_sql,
        )
        .secured_sql(&report.secured_sql)
        .tables(tables)
        .already_scoped(report.already_scoped);

        if let Some(session) = session_id {
            builder = builder.session_id(session);
        }

        self.log(builder.build()).await
    }

    /// Record a rejected statement, keeping the raw SQL for review.
    pub async fn log_rejected(
        &self,
        tenant_id: &str,
        raw_sql: &str,
        reason: &RejectKind,
        session_id: Option<&str>,
    ) -> Result<(), AuditError> {
        if !self.config.log_rejected {
            return Ok(());
        }

        let mut builder = AuditEvent::builder(AuditEventType::QueryRejected, tenant_id, raw_sql)
            .rejection(reason.code(), reason.to_string());

        if let Some(session) = session_id {
            builder = builder.session_id(session);
        }

        self.log(builder.build()).await
    }

    /// Record either outcome of a securing attempt.
    pub async fn log_outcome(
        &self,
        tenant_id: &str,
        raw_sql: &str,
        outcome: &Result<SecuringReport, RejectKind>,
        session_id: Option<&str>,
    ) -> Result<(), AuditError> {
        match outcome {
            Ok(report) => self.log_secured(report, session_id).await,
            Err(reason) => self.log_rejected(tenant_id, raw_sql, reason, session_id).await,
        }
    }

    /// Query audit events with filters.
    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.storage.query(filter).await
    }

    /// Count audit events matching a filter (ignores limit/offset).
    pub async fn count(&self, filter: AuditFilter) -> Result<usize, AuditError> {
        self.storage.count(filter).await
    }

    /// Get an audit event by ID.
    pub async fn get(&self, event_id: uuid::Uuid) -> Result<Option<AuditEvent>, AuditError> {
        self.storage.get(event_id).await
    }

    /// Get recent events for a tenant.
    pub async fn recent_for_tenant(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, AuditError> {
        self.query(AuditFilter {
            tenant_id: Some(tenant_id.to_string()),
            limit: Some(limit),
            ..Default::default()
        })
        .await
    }

    /// Get recent rejections across all tenants.
    pub async fn recent_rejections(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        self.query(AuditFilter {
            event_type: Some(AuditEventType::QueryRejected),
            limit: Some(limit),
            ..Default::default()
        })
        .await
    }
}

/// Filter for querying audit events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Filter by tenant ID.
    pub tenant_id: Option<String>,
    /// Filter by chat session.
    pub session_id: Option<String>,
    /// Filter by event type.
    pub event_type: Option<AuditEventType>,
    /// Filter by rejection code.
    pub reject_code: Option<String>,
    /// Filter by start time.
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Filter by end time.
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
    /// Sort descending (default: true for newest first).
    pub sort_desc: Option<bool>,
}

impl AuditFilter {
    /// Whether an event passes every set criterion.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref tenant) = self.tenant_id {
            if &event.tenant_id != tenant {
                return false;
            }
        }
        if let Some(ref session) = self.session_id {
            if event.session_id.as_ref() != Some(session) {
                return false;
            }
        }
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        if let Some(ref code) = self.reject_code {
            if !event
                .reject_code
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(code))
            {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if event.occurred_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.occurred_at > end {
                return false;
            }
        }
        true
    }

    /// Filter, sort, then page a set of events.
    pub fn apply<'a>(&self, events: impl Iterator<Item = &'a AuditEvent>) -> Vec<AuditEvent> {
        let mut results: Vec<AuditEvent> = events.filter(|e| self.matches(e)).cloned().collect();

        if self.sort_desc.unwrap_or(true) {
            results.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        } else {
            results.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        }

        results
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}
