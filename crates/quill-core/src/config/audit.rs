//! Audit storage configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit entries are written at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Whether the logger also emits each entry as a `tracing` event.
    #[serde(default = "default_enabled")]
    pub trace_entries: bool,

    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where audit entries are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend type.
    #[serde(default)]
    pub backend: StorageBackend,

    /// File path (for the file backend).
    #[serde(default)]
    pub file_path: Option<String>,

    /// Database URL (for the database backend).
    #[serde(default)]
    pub database_url: Option<String>,

    /// Table holding audit rows (for the database backend).
    #[serde(default = "default_table")]
    pub table: String,
}

/// Storage backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Keep entries in process memory.
    #[default]
    Memory,
    /// Print entries to stdout as JSON lines.
    Console,
    /// Append entries to a JSON Lines file.
    File,
    /// Store entries in a Postgres table.
    Database,
    /// Discard entries.
    Null,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Console => write!(f, "console"),
            Self::File => write!(f, "file"),
            Self::Database => write!(f, "database"),
            Self::Null => write!(f, "null"),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            trace_entries: default_enabled(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            file_path: None,
            database_url: None,
            table: default_table(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_table() -> String {
    "audits".to_string()
}
