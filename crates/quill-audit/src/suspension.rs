//! Scoped suspension of audit writing.
//!
//! Suspension is tracked per task: a `tokio` task-local set holds the entity
//! types whose audit hooks are currently replaced by no-ops. Other tasks keep
//! auditing while one task is inside a suspended scope. Tasks spawned from
//! inside a scope start with auditing enabled.

use std::collections::BTreeSet;
use std::future::Future;

tokio::task_local! {
    static SUSPENDED: BTreeSet<String>;
}

/// Whether audit hooks run for a persistence operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditMode {
    /// Write audit entries.
    #[default]
    Enabled,
    /// Skip audit entries for this operation.
    Suspended,
}

impl AuditMode {
    /// The mode an operation on `type_name` actually runs with.
    pub fn effective(self, type_name: &str) -> AuditMode {
        if self == AuditMode::Suspended || is_suspended(type_name) {
            AuditMode::Suspended
        } else {
            AuditMode::Enabled
        }
    }
}

/// Whether the current task is inside a suspended scope for `type_name`.
pub fn is_suspended(type_name: &str) -> bool {
    SUSPENDED
        .try_with(|types| types.contains(type_name))
        .unwrap_or(false)
}

fn with_type(type_name: &str) -> BTreeSet<String> {
    let mut types = SUSPENDED
        .try_with(|types| types.clone())
        .unwrap_or_default();
    types.insert(type_name.to_string());
    types
}

/// Run `work` with auditing of `type_name` suspended on this task.
///
/// The previous state is restored when the future completes, errors or
/// unwinds. Scopes nest.
pub async fn suspend<Fut>(type_name: &str, work: Fut) -> Fut::Output
where
    Fut: Future,
{
    tracing::trace!(auditable_type = %type_name, "Suspending audit hooks");
    SUSPENDED.scope(with_type(type_name), work).await
}

/// Synchronous form of [`suspend`].
pub fn suspend_sync<F, T>(type_name: &str, work: F) -> T
where
    F: FnOnce() -> T,
{
    SUSPENDED.sync_scope(with_type(type_name), work)
}
