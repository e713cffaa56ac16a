//! Audit logger implementation.
//!
//! [`AuditLogger`] is the single path audit entries take into storage, and
//! the query surface over what was written.

use chrono::{DateTime, Utc};
use quill_core::AuditConfig;
use std::sync::Arc;

use crate::entry::{AuditAction, AuditEntry};
use crate::error::AuditError;
use crate::storage::{self, AuditStorage, ConsoleStorage, MemoryStorage, NullStorage};

/// The main audit logger.
pub struct AuditLogger {
    config: AuditConfig,
    storage: Arc<dyn AuditStorage>,
}

impl AuditLogger {
    /// Create a new audit logger with the given configuration.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let storage = storage::create_storage(&config)?;
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
            storage: Arc::new(NullStorage),
        }
    }

    /// Create a console-only logger (useful for development).
    pub fn console_only() -> Self {
        Self {
            config: AuditConfig::default(),
            storage: Arc::new(ConsoleStorage),
        }
    }

    /// Create a logger over a fresh in-memory store (useful for tests).
    pub fn in_memory() -> (Self, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let logger = Self::with_storage(AuditConfig::default(), storage.clone());
        (logger, storage)
    }

    /// Check if logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Log an audit entry.
    pub async fn log(&self, entry: AuditEntry) -> Result<(), AuditError> {
        if !self.config.enabled {
            return Ok(());
        }

        if self.config.trace_entries {
            tracing::debug!(
                entry_id = %entry.id,
                action = %entry.action,
                auditable_type = %entry.auditable_type,
                auditable_id = entry.auditable_id.as_deref().unwrap_or("-"),
                user_id = entry.user_id.as_deref().unwrap_or("-"),
                "Audit entry"
            );
        }

        self.storage.store(entry).await
    }

    /// Query audit entries with filters.
    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        self.storage.query(filter).await
    }

    /// Count audit entries matching a filter (ignores limit/offset).
    pub async fn count(&self, filter: AuditFilter) -> Result<usize, AuditError> {
        self.storage.count(filter).await
    }

    /// Get an audit entry by ID.
    pub async fn get(&self, entry_id: uuid::Uuid) -> Result<Option<AuditEntry>, AuditError> {
        self.storage.get(entry_id).await
    }

    /// Every entry of one record, oldest first.
    pub async fn history_for(
        &self,
        auditable_type: &str,
        auditable_id: &str,
    ) -> Result<Vec<AuditEntry>, AuditError> {
        self.query(AuditFilter::for_record(auditable_type, auditable_id))
            .await
    }

    /// Unlink the entries of a destroyed record.
    pub async fn nullify(
        &self,
        auditable_type: &str,
        auditable_id: &str,
    ) -> Result<usize, AuditError> {
        self.storage.nullify(auditable_type, auditable_id).await
    }
}

/// Filter for querying audit entries.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Filter by entity type.
    pub auditable_type: Option<String>,
    /// Filter by record identifier.
    pub auditable_id: Option<String>,
    /// Filter by action.
    pub action: Option<AuditAction>,
    /// Filter by acting user.
    pub user_id: Option<String>,
    /// Filter by start time.
    pub start_time: Option<DateTime<Utc>>,
    /// Filter by end time.
    pub end_time: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
    /// Return newest entries first (default: oldest first).
    pub newest_first: bool,
}

impl AuditFilter {
    /// Entries of one record.
    pub fn for_record(auditable_type: impl Into<String>, auditable_id: impl Into<String>) -> Self {
        Self {
            auditable_type: Some(auditable_type.into()),
            auditable_id: Some(auditable_id.into()),
            ..Default::default()
        }
    }

    /// Whether an entry passes every set criterion.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(ref auditable_type) = self.auditable_type {
            if &entry.auditable_type != auditable_type {
                return false;
            }
        }
        if let Some(ref auditable_id) = self.auditable_id {
            if entry.auditable_id.as_ref() != Some(auditable_id) {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(ref user_id) = self.user_id {
            if entry.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if entry.created_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if entry.created_at > end {
                return false;
            }
        }
        true
    }
}
