//! # quill-audit
//!
//! Automatic change auditing for persisted records.
//!
//! This crate provides functionality for:
//! - Tracking `(old, new)` values of audited attributes as records are written
//! - Writing an audit entry on every create, destroy and changing update
//! - Resolving the acting user through an injected actor source
//! - Suspending audit writing for a scope
//! - Storing audit entries in memory, files (JSON Lines) or the console
//! - Querying audit history with filters
//!
//! ## Lifecycle
//!
//! | Operation | Entry written |
//! |-----------|---------------|
//! | create | `create`, always |
//! | update | `update`, only when an audited attribute changed |
//! | destroy | `destroy`, always |
//!
//! Pending changes are cleared after every create or update.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quill_audit::{ActorRegistry, AuditLogger, Auditor, CurrentActor, MemoryRecordStore, ModelDefinition};
//! use quill_core::AuditableOptions;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let current_user = Arc::new(CurrentActor::new());
//! let actors = ActorRegistry::new().with("User", "current_user", current_user.clone());
//!
//! let auditor = Auditor::new(
//!     Arc::new(MemoryRecordStore::new()),
//!     Arc::new(AuditLogger::console_only()),
//! )
//! .with_actors(actors);
//!
//! let people = auditor.register(
//!     ModelDefinition::new("Person", ["id", "name", "email", "created_at"]),
//!     &AuditableOptions::default(),
//! )?;
//!
//! current_user.set("7");
//! let mut alice = people.build([("name", serde_json::json!("Alice"))])?;
//! people.create(&mut alice).await?;
//!
//! alice.set("name", "Bob")?;
//! people.save(&mut alice).await?;
//!
//! // No entries for anything inside this scope.
//! people
//!     .without_auditing(async { people.destroy(&mut alice).await })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod auditor;
pub mod changes;
pub mod entry;
pub mod error;
pub mod hooks;
pub mod logger;
pub mod model;
pub mod record;
pub mod storage;
pub mod store;
pub mod suspension;

pub use actor::{ActorRegistry, ActorSource, CurrentActor};
pub use auditor::Auditor;
pub use changes::{Change, ChangeSet};
pub use entry::{AuditAction, AuditEntry, AuditEntryBuilder};
pub use error::AuditError;
pub use hooks::{AuditHooks, LifecycleHooks, SuspendedHooks};
pub use logger::{AuditFilter, AuditLogger};
pub use model::{AuditedModel, ModelDefinition};
pub use record::{Record, RecordFuture};
pub use storage::{AuditStorage, ConsoleStorage, FileStorage, MemoryStorage, NullStorage};
pub use store::{Attributes, MemoryRecordStore, RecordStore};
pub use suspension::AuditMode;
