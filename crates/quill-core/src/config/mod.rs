//! Configuration types for Quill.
//!
//! A single YAML file (`quill.yaml`) holds the audit storage settings and
//! the auditing options of each model, keyed by entity type name.

pub mod audit;
pub mod auditable;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub use audit::{AuditConfig, StorageBackend, StorageConfig};
pub use auditable::{AuditableOptions, ColumnList, UserClass};

/// Complete Quill configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuillConfig {
    /// Project name.
    #[serde(default)]
    pub project: Option<String>,

    /// Audit log configuration.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Auditing options per entity type.
    #[serde(default)]
    pub models: BTreeMap<String, AuditableOptions>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QuillConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Options for a model, falling back to the defaults.
    pub fn model_options(&self, type_name: &str) -> AuditableOptions {
        self.models.get(type_name).cloned().unwrap_or_default()
    }

    /// Reject settings that cannot work at all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let storage = &self.audit.storage;
        if storage.backend == StorageBackend::Database && storage.database_url.is_none() {
            return Err(ConfigError::Config(
                "audit.storage.database_url is required for the database backend".to_string(),
            ));
        }
        if storage.table.trim().is_empty() {
            return Err(ConfigError::Config(
                "audit.storage.table must not be empty".to_string(),
            ));
        }
        for (name, options) in &self.models {
            if options.user_class_name.name().is_some() && options.user_method.trim().is_empty() {
                return Err(ConfigError::Config(format!(
                    "models.{}.user_method must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}
