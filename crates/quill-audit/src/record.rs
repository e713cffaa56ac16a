//! Audited records.
//!
//! A [`Record`] is one row of an audited model: its attribute values plus the
//! changes written since the last save. Every write goes through
//! [`Record::write_attribute`] (or the typed [`Record::set`]), which records
//! `(old, new)` for audited attributes before storing the value.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::changes::ChangeSet;
use crate::error::AuditError;
use crate::model::ModelSchema;
use crate::suspension;

/// Boxed future borrowing a record, used by [`Record::without_auditing`].
pub type RecordFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

static NULL: Value = Value::Null;

/// One row of an audited model.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<ModelSchema>,
    id: Option<String>,
    destroyed: bool,
    attributes: BTreeMap<String, Value>,
    changes: ChangeSet,
}

impl Record {
    pub(crate) fn new(schema: Arc<ModelSchema>) -> Self {
        Self {
            schema,
            id: None,
            destroyed: false,
            attributes: BTreeMap::new(),
            changes: ChangeSet::new(),
        }
    }

    pub(crate) fn loaded(
        schema: Arc<ModelSchema>,
        id: String,
        attributes: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            schema,
            id: Some(id),
            destroyed: false,
            attributes,
            changes: ChangeSet::new(),
        }
    }

    /// Entity type name.
    pub fn type_name(&self) -> &str {
        &self.schema.type_name
    }

    /// Identifier assigned by the store on create.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Not yet created.
    pub fn is_new_record(&self) -> bool {
        self.id.is_none()
    }

    /// Created and not destroyed.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some() && !self.destroyed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Write an attribute, tracking the change if the attribute is audited.
    pub fn write_attribute(&mut self, name: &str, value: Value) -> Result<(), AuditError> {
        if !self.schema.columns.contains(name) {
            return Err(AuditError::UnknownAttribute {
                model: self.schema.type_name.clone(),
                attribute: name.to_string(),
            });
        }

        if self.schema.audited.contains(name) {
            let current = self.attributes.get(name).unwrap_or(&NULL);
            if self.changes.record(name, current, &value) {
                tracing::trace!(
                    auditable_type = %self.schema.type_name,
                    attribute = %name,
                    "Tracked attribute change"
                );
            }
        }

        self.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Typed form of [`write_attribute`](Self::write_attribute).
    pub fn set<V: Serialize>(&mut self, name: &str, value: V) -> Result<(), AuditError> {
        let value = serde_json::to_value(value)?;
        self.write_attribute(name, value)
    }

    /// Current value of an attribute; null when unset.
    pub fn read_attribute(&self, name: &str) -> &Value {
        self.attributes.get(name).unwrap_or(&NULL)
    }

    /// Typed form of [`read_attribute`](Self::read_attribute).
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AuditError> {
        match self.attributes.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Whether any audited attribute has a pending change.
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Whether the named attribute has a pending change.
    pub fn attribute_changed(&self, name: &str) -> bool {
        self.changes.contains(name)
    }

    /// Pending changes since the last save.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn clear_changes(&mut self) {
        self.changes.clear();
    }

    pub(crate) fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub(crate) fn mark_persisted(&mut self, id: String) {
        self.id = Some(id);
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }

    /// Run `work` with auditing of this record's model suspended.
    ///
    /// Delegates to the type-level scope: every record of the model, not only
    /// this one, skips auditing on the current task while `work` runs.
    pub async fn without_auditing<'r, F, T>(&'r mut self, work: F) -> T
    where
        F: FnOnce(&'r mut Record) -> RecordFuture<'r, T>,
    {
        let type_name = self.schema.type_name.clone();
        suspension::suspend(&type_name, work(self)).await
    }
}
