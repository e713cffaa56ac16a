//! # quill-core
//!
//! Configuration types shared across all Quill crates.
//!
//! Configuration is loaded from a single YAML file (`quill.yaml`) holding the
//! audit storage settings and the per-model auditing options.

pub mod config;

pub use config::{
    AuditConfig, AuditableOptions, ColumnList, ConfigError, QuillConfig, StorageBackend,
    StorageConfig, UserClass,
};
