//! Audit entry types.
//!
//! One [`AuditEntry`] is written per audited lifecycle transition of a
//! record. The owning record is referenced polymorphically by
//! `(auditable_type, auditable_id)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::changes::ChangeSet;

/// The lifecycle transition an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Destroy,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "destroy" => Ok(Self::Destroy),
            other => Err(format!("unknown audit action '{}'", other)),
        }
    }
}

/// One logged change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID.
    pub id: Uuid,

    /// Entity type of the owning record.
    pub auditable_type: String,

    /// Identifier of the owning record; cleared once the record is destroyed.
    pub auditable_id: Option<String>,

    /// Serialized change map (`{"attr": [old, new]}`).
    pub changes: String,

    /// The lifecycle transition.
    pub action: AuditAction,

    /// Identifier of the acting user, if one was resolved.
    pub user_id: Option<String>,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create a builder for an entry.
    pub fn builder(
        action: AuditAction,
        auditable_type: impl Into<String>,
        auditable_id: impl Into<String>,
    ) -> AuditEntryBuilder {
        AuditEntryBuilder::new(action, auditable_type, auditable_id)
    }

    /// Parse the serialized change map.
    pub fn change_set(&self) -> Result<ChangeSet, serde_json::Error> {
        ChangeSet::from_text(&self.changes)
    }

    /// Format the entry as a human-readable log line.
    ///
    /// Format: `[timestamp] ACTION type#id user=... changed=[...]`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} {}#{}",
            self.created_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.action.as_str().to_uppercase(),
            self.auditable_type,
            self.auditable_id.as_deref().unwrap_or("-"),
        );

        if let Some(ref user_id) = self.user_id {
            line.push_str(&format!(" user={}", user_id));
        }

        if let Ok(changes) = self.change_set() {
            let fields: Vec<&str> = changes.attributes().collect();
            if !fields.is_empty() {
                line.push_str(&format!(" changed=[{}]", fields.join(",")));
            }
        }

        line
    }
}

/// Builder for audit entries.
#[derive(Debug)]
pub struct AuditEntryBuilder {
    entry: AuditEntry,
}

impl AuditEntryBuilder {
    pub fn new(
        action: AuditAction,
        auditable_type: impl Into<String>,
        auditable_id: impl Into<String>,
    ) -> Self {
        Self {
            entry: AuditEntry {
                id: Uuid::new_v4(),
                auditable_type: auditable_type.into(),
                auditable_id: Some(auditable_id.into()),
                changes: "{}".to_string(),
                action,
                user_id: None,
                created_at: Utc::now(),
            },
        }
    }

    /// Serialize and attach the change map.
    pub fn changes(mut self, changes: &ChangeSet) -> Result<Self, serde_json::Error> {
        self.entry.changes = changes.to_text()?;
        Ok(self)
    }

    /// Set the acting user.
    pub fn user_id(mut self, user_id: Option<String>) -> Self {
        self.entry.user_id = user_id;
        self
    }

    /// Override the timestamp.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.entry.created_at = at;
        self
    }

    pub fn build(self) -> AuditEntry {
        self.entry
    }
}
