//! Lifecycle hooks that write audit entries.
//!
//! [`AuditedModel`](crate::AuditedModel) calls these around store writes:
//!
//! | Phase | Audit hooks | Suspended hooks |
//! |-------|-------------|-----------------|
//! | after create | write `create` entry | nothing |
//! | after update | write `update` entry if changed | nothing |
//! | before destroy | write `destroy` entry | nothing |
//! | after save | clear pending changes | clear pending changes |
//!
//! After save runs after the create/update hook, so the entry sees the
//! changes before they are cleared.

use async_trait::async_trait;
use std::sync::Arc;

use crate::actor::ActorSource;
use crate::entry::{AuditAction, AuditEntry};
use crate::error::AuditError;
use crate::logger::AuditLogger;
use crate::record::Record;

/// Handlers for the audited lifecycle phases.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn after_create(&self, record: &Record) -> Result<(), AuditError>;

    async fn after_update(&self, record: &Record) -> Result<(), AuditError>;

    async fn before_destroy(&self, record: &Record) -> Result<(), AuditError>;

    async fn after_save(&self, record: &mut Record) -> Result<(), AuditError> {
        record.clear_changes();
        Ok(())
    }
}

/// Hooks that write audit entries through a logger.
pub struct AuditHooks {
    logger: Arc<AuditLogger>,
    actor: Option<Arc<dyn ActorSource>>,
}

impl AuditHooks {
    /// Hooks writing through `logger`, stamping entries with `actor` if given.
    pub fn new(logger: Arc<AuditLogger>, actor: Option<Arc<dyn ActorSource>>) -> Self {
        Self { logger, actor }
    }

    fn current_user(&self) -> Option<String> {
        self.actor.as_ref().and_then(|actor| actor.current_actor())
    }

    async fn write(&self, action: AuditAction, record: &Record) -> Result<(), AuditError> {
        let id = record
            .id()
            .ok_or_else(|| AuditError::NotPersisted(record.type_name().to_string()))?;

        let entry = AuditEntry::builder(action, record.type_name(), id)
            .changes(record.changes())?
            .user_id(self.current_user())
            .build();

        self.logger.log(entry).await
    }
}

#[async_trait]
impl LifecycleHooks for AuditHooks {
    async fn after_create(&self, record: &Record) -> Result<(), AuditError> {
        self.write(AuditAction::Create, record).await
    }

    async fn after_update(&self, record: &Record) -> Result<(), AuditError> {
        if !record.changed() {
            return Ok(());
        }
        self.write(AuditAction::Update, record).await
    }

    async fn before_destroy(&self, record: &Record) -> Result<(), AuditError> {
        self.write(AuditAction::Destroy, record).await
    }
}

/// Hooks with audit writing replaced by no-ops.
pub struct SuspendedHooks;

#[async_trait]
impl LifecycleHooks for SuspendedHooks {
    async fn after_create(&self, _record: &Record) -> Result<(), AuditError> {
        Ok(())
    }

    async fn after_update(&self, _record: &Record) -> Result<(), AuditError> {
        Ok(())
    }

    async fn before_destroy(&self, _record: &Record) -> Result<(), AuditError> {
        Ok(())
    }
}
