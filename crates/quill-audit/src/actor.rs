//! Actor resolution.
//!
//! Audit entries record who made a change. Applications register actor
//! sources under a `(class, method)` name pair; a model names the pair in its
//! [`AuditableOptions`](quill_core::AuditableOptions) and the source is
//! looked up once, when the model is registered.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Something that knows the current actor.
pub trait ActorSource: Send + Sync {
    /// Identifier of the current actor, if there is one.
    fn current_actor(&self) -> Option<String>;
}

impl<F> ActorSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_actor(&self) -> Option<String> {
        self()
    }
}

/// An actor source holding a value that callers swap as requests come and go.
#[derive(Debug, Default)]
pub struct CurrentActor {
    actor: RwLock<Option<String>>,
}

impl CurrentActor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current actor.
    pub fn set(&self, actor: impl Into<String>) {
        if let Ok(mut current) = self.actor.write() {
            *current = Some(actor.into());
        }
    }

    /// Forget the current actor.
    pub fn clear(&self) {
        if let Ok(mut current) = self.actor.write() {
            *current = None;
        }
    }
}

impl ActorSource for CurrentActor {
    fn current_actor(&self) -> Option<String> {
        self.actor.read().ok().and_then(|actor| actor.clone())
    }
}

/// Registered actor sources keyed by `(class, method)`.
#[derive(Clone, Default)]
pub struct ActorRegistry {
    sources: HashMap<(String, String), Arc<dyn ActorSource>>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under a class and method name.
    pub fn register(
        &mut self,
        class: impl Into<String>,
        method: impl Into<String>,
        source: Arc<dyn ActorSource>,
    ) -> &mut Self {
        self.sources.insert((class.into(), method.into()), source);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        class: impl Into<String>,
        method: impl Into<String>,
        source: Arc<dyn ActorSource>,
    ) -> Self {
        self.register(class, method, source);
        self
    }

    /// Look up a source.
    pub fn resolve(&self, class: &str, method: &str) -> Option<Arc<dyn ActorSource>> {
        self.sources
            .get(&(class.to_string(), method.to_string()))
            .cloned()
    }

    /// Registered `(class, method)` pairs, sorted.
    pub fn names(&self) -> Vec<(String, String)> {
        let mut names: Vec<_> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("sources", &self.names())
            .finish()
    }
}
