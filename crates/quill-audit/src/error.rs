//! Error types for the audit crate.

use thiserror::Error;

/// Errors that can occur during audited persistence.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A model was registered with options that cannot be satisfied.
    #[error("invalid audit configuration for '{model}': {message}")]
    Configuration { model: String, message: String },

    /// No actor source is registered under the configured names.
    #[error("unknown actor source '{class}.{method}' for model '{model}'")]
    UnknownActorSource {
        model: String,
        class: String,
        method: String,
    },

    /// An attribute that the model does not declare was written.
    #[error("unknown attribute '{attribute}' for model '{model}'")]
    UnknownAttribute { model: String, attribute: String },

    /// A record of one model was handed to another.
    #[error("record of type '{actual}' cannot be persisted as '{expected}'")]
    ModelMismatch { expected: String, actual: String },

    /// The operation needs a persisted record.
    #[error("record of type '{0}' has not been created yet")]
    NotPersisted(String),

    /// The operation needs a record that is not yet persisted.
    #[error("record of type '{model}' is already persisted with id '{id}'")]
    AlreadyPersisted { model: String, id: String },

    /// Failed to log an entry.
    #[error("failed to log audit entry: {0}")]
    LogFailed(String),

    /// Failed to query audit entries.
    #[error("failed to query audit entries: {0}")]
    QueryFailed(String),

    /// Storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure reported by the record store.
    #[error("persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}
