//! Model definitions and audited models.
//!
//! A [`ModelDefinition`] statically declares an entity type and its columns.
//! Registering it through an [`Auditor`](crate::Auditor) yields an
//! [`AuditedModel`]: the audited column set is computed once, the actor
//! source is resolved once, and every create, update and destroy of the
//! model's records runs the audit hooks.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use quill_core::AuditableOptions;

use crate::entry::AuditEntry;
use crate::error::AuditError;
use crate::hooks::{AuditHooks, LifecycleHooks, SuspendedHooks};
use crate::logger::AuditLogger;
use crate::record::Record;
use crate::store::RecordStore;
use crate::suspension::{self, AuditMode};

/// Timestamp columns that are never audited.
pub const TIMESTAMP_COLUMNS: [&str; 4] = ["created_at", "created_on", "updated_at", "updated_on"];

/// Primary key column unless the definition names another.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Inheritance discriminator column unless the definition names another.
pub const DEFAULT_INHERITANCE_COLUMN: &str = "type";

/// Optimistic locking column unless the definition names another.
pub const DEFAULT_LOCKING_COLUMN: &str = "lock_version";

/// Static description of an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    /// Entity type name, stored as `auditable_type`.
    pub type_name: String,
    /// Every column of the entity, in declaration order.
    pub columns: Vec<String>,
    /// Primary key column.
    pub primary_key: String,
    /// Single-table inheritance discriminator column.
    pub inheritance_column: String,
    /// Optimistic locking column.
    pub locking_column: String,
    /// Values written to new records before caller input.
    pub defaults: BTreeMap<String, Value>,
}

impl ModelDefinition {
    pub fn new<I, S>(type_name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_name: type_name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            inheritance_column: DEFAULT_INHERITANCE_COLUMN.to_string(),
            locking_column: DEFAULT_LOCKING_COLUMN.to_string(),
            defaults: BTreeMap::new(),
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn inheritance_column(mut self, column: impl Into<String>) -> Self {
        self.inheritance_column = column.into();
        self
    }

    pub fn locking_column(mut self, column: impl Into<String>) -> Self {
        self.locking_column = column.into();
        self
    }

    /// Default value for a column on new records.
    pub fn default_value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(column.into(), value);
        self
    }

    /// Columns excluded regardless of options.
    pub fn default_exclusions(&self) -> Vec<String> {
        let mut excluded = vec![
            self.primary_key.clone(),
            self.inheritance_column.clone(),
            self.locking_column.clone(),
        ];
        excluded.extend(TIMESTAMP_COLUMNS.iter().map(|c| c.to_string()));
        excluded
    }
}

/// Column sets of a registered model, shared by its records.
#[derive(Debug, PartialEq)]
pub(crate) struct ModelSchema {
    pub(crate) type_name: String,
    pub(crate) columns: BTreeSet<String>,
    pub(crate) audited: BTreeSet<String>,
    pub(crate) defaults: BTreeMap<String, Value>,
}

impl ModelSchema {
    pub(crate) fn compile(definition: &ModelDefinition, options: &AuditableOptions) -> Self {
        let mut excluded: BTreeSet<String> = definition.default_exclusions().into_iter().collect();
        excluded.extend(options.exclude_columns.as_slice().iter().cloned());

        let columns: BTreeSet<String> = definition.columns.iter().cloned().collect();
        let audited = columns.difference(&excluded).cloned().collect();

        Self {
            type_name: definition.type_name.clone(),
            columns,
            audited,
            defaults: definition.defaults.clone(),
        }
    }
}

/// A registered model whose lifecycle operations write audit entries.
pub struct AuditedModel {
    schema: Arc<ModelSchema>,
    store: Arc<dyn RecordStore>,
    logger: Arc<AuditLogger>,
    audit_hooks: AuditHooks,
    suspended_hooks: SuspendedHooks,
    nullify_on_destroy: bool,
}

impl AuditedModel {
    pub(crate) fn new(
        schema: ModelSchema,
        store: Arc<dyn RecordStore>,
        logger: Arc<AuditLogger>,
        audit_hooks: AuditHooks,
        nullify_on_destroy: bool,
    ) -> Self {
        Self {
            schema: Arc::new(schema),
            store,
            logger,
            audit_hooks,
            suspended_hooks: SuspendedHooks,
            nullify_on_destroy,
        }
    }

    /// Entity type name.
    pub fn type_name(&self) -> &str {
        &self.schema.type_name
    }

    /// Audited columns, sorted.
    pub fn audited_columns(&self) -> Vec<&str> {
        self.schema.audited.iter().map(String::as_str).collect()
    }

    pub fn is_audited(&self, column: &str) -> bool {
        self.schema.audited.contains(column)
    }

    /// A new, unsaved record with the model's defaults written.
    pub fn new_record(&self) -> Result<Record, AuditError> {
        let mut record = Record::new(Arc::clone(&self.schema));
        for (column, value) in &self.schema.defaults {
            record.write_attribute(column, value.clone())?;
        }
        Ok(record)
    }

    /// A new, unsaved record with defaults and then `attributes` written.
    pub fn build<I, K>(&self, attributes: I) -> Result<Record, AuditError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut record = self.new_record()?;
        for (column, value) in attributes {
            record.write_attribute(column.as_ref(), value)?;
        }
        Ok(record)
    }

    /// Load a record from the store with no pending changes.
    pub async fn find(&self, id: &str) -> Result<Option<Record>, AuditError> {
        let attributes = self.store.fetch(self.type_name(), id).await?;
        Ok(attributes.map(|attributes| {
            Record::loaded(Arc::clone(&self.schema), id.to_string(), attributes)
        }))
    }

    /// Create when new, update otherwise.
    pub async fn save(&self, record: &mut Record) -> Result<(), AuditError> {
        self.save_with(record, AuditMode::Enabled).await
    }

    pub async fn save_with(&self, record: &mut Record, mode: AuditMode) -> Result<(), AuditError> {
        if record.is_new_record() {
            self.create_with(record, mode).await
        } else {
            self.update_with(record, mode).await
        }
    }

    /// Insert a new record and write a `create` entry.
    ///
    /// The insert is not rolled back when the audit write fails: the record
    /// keeps its id and pending changes, so a retried [`save`](Self::save)
    /// takes the update path and logs those changes as an `update`.
    pub async fn create(&self, record: &mut Record) -> Result<(), AuditError> {
        self.create_with(record, AuditMode::Enabled).await
    }

    pub async fn create_with(&self, record: &mut Record, mode: AuditMode) -> Result<(), AuditError> {
        self.check_owner(record)?;
        if let Some(id) = record.id() {
            return Err(AuditError::AlreadyPersisted {
                model: self.type_name().to_string(),
                id: id.to_string(),
            });
        }

        let hooks = self.hooks(mode);
        let id = self.store.insert(self.type_name(), record.attributes()).await?;
        record.mark_persisted(id);

        hooks.after_create(record).await?;
        hooks.after_save(record).await
    }

    /// Write a persisted record back and, if it changed, an `update` entry.
    pub async fn update(&self, record: &mut Record) -> Result<(), AuditError> {
        self.update_with(record, AuditMode::Enabled).await
    }

    pub async fn update_with(&self, record: &mut Record, mode: AuditMode) -> Result<(), AuditError> {
        self.check_owner(record)?;
        let id = self.persisted_id(record)?;

        let hooks = self.hooks(mode);
        self.store
            .update(self.type_name(), &id, record.attributes())
            .await?;

        hooks.after_update(record).await?;
        hooks.after_save(record).await
    }

    /// Unlink earlier entries, write a `destroy` entry, then delete the record.
    ///
    /// The `destroy` entry keeps its link, so the destroyed record stays
    /// identifiable in the log.
    pub async fn destroy(&self, record: &mut Record) -> Result<(), AuditError> {
        self.destroy_with(record, AuditMode::Enabled).await
    }

    pub async fn destroy_with(&self, record: &mut Record, mode: AuditMode) -> Result<(), AuditError> {
        self.check_owner(record)?;
        let id = self.persisted_id(record)?;

        if self.nullify_on_destroy {
            let unlinked = self.logger.nullify(self.type_name(), &id).await?;
            tracing::debug!(
                auditable_type = %self.type_name(),
                auditable_id = %id,
                unlinked,
                "Unlinked audit entries of destroyed record"
            );
        }

        self.hooks(mode).before_destroy(record).await?;
        self.store.delete(self.type_name(), &id).await?;
        record.mark_destroyed();
        Ok(())
    }

    /// Run `work` with this model's audit hooks suspended on the current task.
    ///
    /// Every record of the model skips auditing while `work` runs; other
    /// tasks are unaffected.
    pub async fn without_auditing<Fut>(&self, work: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        suspension::suspend(self.type_name(), work).await
    }

    /// Audit entries of a record, oldest first.
    pub async fn audits(&self, record: &Record) -> Result<Vec<AuditEntry>, AuditError> {
        match record.id() {
            Some(id) => self.logger.history_for(self.type_name(), id).await,
            None => Ok(Vec::new()),
        }
    }

    fn hooks(&self, mode: AuditMode) -> &dyn LifecycleHooks {
        match mode.effective(self.type_name()) {
            AuditMode::Enabled => &self.audit_hooks,
            AuditMode::Suspended => &self.suspended_hooks,
        }
    }

    fn check_owner(&self, record: &Record) -> Result<(), AuditError> {
        if Arc::ptr_eq(record.schema(), &self.schema) || **record.schema() == *self.schema {
            Ok(())
        } else {
            Err(AuditError::ModelMismatch {
                expected: self.type_name().to_string(),
                actual: record.type_name().to_string(),
            })
        }
    }

    fn persisted_id(&self, record: &Record) -> Result<String, AuditError> {
        match record.id() {
            Some(id) if !record.is_destroyed() => Ok(id.to_string()),
            _ => Err(AuditError::NotPersisted(self.type_name().to_string())),
        }
    }
}

impl std::fmt::Debug for AuditedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditedModel")
            .field("type_name", &self.schema.type_name)
            .field("audited", &self.schema.audited)
            .field("nullify_on_destroy", &self.nullify_on_destroy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audited_set_is_columns_minus_exclusions() {
        let definition = ModelDefinition::new(
            "Person",
            [
                "id",
                "type",
                "lock_version",
                "created_at",
                "updated_on",
                "name",
                "email",
                "password_digest",
            ],
        );
        let options = AuditableOptions::default().exclude(["password_digest"]);
        let schema = ModelSchema::compile(&definition, &options);

        let audited: Vec<&str> = schema.audited.iter().map(String::as_str).collect();
        assert_eq!(audited, vec!["email", "name"]);
        assert_eq!(schema.columns.len(), 8);
    }

    #[test]
    fn custom_key_columns_are_excluded() {
        let definition = ModelDefinition::new("Ledger", ["ledger_id", "kind", "revision", "total"])
            .primary_key("ledger_id")
            .inheritance_column("kind")
            .locking_column("revision");
        let schema = ModelSchema::compile(&definition, &AuditableOptions::default());

        let audited: Vec<&str> = schema.audited.iter().map(String::as_str).collect();
        assert_eq!(audited, vec!["total"]);
    }

    #[test]
    fn default_exclusions_include_timestamps() {
        let definition = ModelDefinition::new("Person", ["id"]);
        let excluded = definition.default_exclusions();
        for column in TIMESTAMP_COLUMNS {
            assert!(excluded.iter().any(|c| c == column));
        }
        assert!(excluded.iter().any(|c| c == "id"));
    }
}
