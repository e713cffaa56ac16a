//! Model registration.

use std::sync::Arc;

use quill_core::{AuditableOptions, QuillConfig};

use crate::actor::{ActorRegistry, ActorSource};
use crate::error::AuditError;
use crate::hooks::AuditHooks;
use crate::logger::AuditLogger;
use crate::model::{AuditedModel, ModelDefinition, ModelSchema};
use crate::store::RecordStore;

/// Shared context that turns model definitions into audited models.
#[derive(Clone)]
pub struct Auditor {
    store: Arc<dyn RecordStore>,
    logger: Arc<AuditLogger>,
    actors: ActorRegistry,
}

impl Auditor {
    pub fn new(store: Arc<dyn RecordStore>, logger: Arc<AuditLogger>) -> Self {
        Self {
            store,
            logger,
            actors: ActorRegistry::new(),
        }
    }

    /// Use these actor sources when registering models.
    pub fn with_actors(mut self, actors: ActorRegistry) -> Self {
        self.actors = actors;
        self
    }

    pub fn logger(&self) -> &Arc<AuditLogger> {
        &self.logger
    }

    pub fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    /// Register a model.
    ///
    /// Computes the audited column set and resolves the actor source named by
    /// `options`. An actor source that is not registered is an error here,
    /// before any record is saved.
    pub fn register(
        &self,
        definition: ModelDefinition,
        options: &AuditableOptions,
    ) -> Result<AuditedModel, AuditError> {
        if definition.type_name.trim().is_empty() {
            return Err(AuditError::Configuration {
                model: definition.type_name.clone(),
                message: "type name must not be empty".to_string(),
            });
        }

        for column in options.exclude_columns.as_slice() {
            if !definition.columns.contains(column) {
                tracing::warn!(
                    auditable_type = %definition.type_name,
                    column = %column,
                    "Excluded column is not declared by the model"
                );
            }
        }

        let actor = self.resolve_actor(&definition.type_name, options)?;
        let schema = ModelSchema::compile(&definition, options);

        tracing::debug!(
            auditable_type = %schema.type_name,
            audited = schema.audited.len(),
            user_resolution = actor.is_some(),
            "Registered audited model"
        );

        Ok(AuditedModel::new(
            schema,
            Arc::clone(&self.store),
            Arc::clone(&self.logger),
            AuditHooks::new(Arc::clone(&self.logger), actor),
            options.nullify_on_destroy,
        ))
    }

    /// Register a model with the options configured for its type name.
    pub fn register_configured(
        &self,
        definition: ModelDefinition,
        config: &QuillConfig,
    ) -> Result<AuditedModel, AuditError> {
        let options = config.model_options(&definition.type_name);
        self.register(definition, &options)
    }

    fn resolve_actor(
        &self,
        model: &str,
        options: &AuditableOptions,
    ) -> Result<Option<Arc<dyn ActorSource>>, AuditError> {
        let Some(class) = options.user_class_name.name() else {
            return Ok(None);
        };

        self.actors
            .resolve(class, &options.user_method)
            .map(Some)
            .ok_or_else(|| AuditError::UnknownActorSource {
                model: model.to_string(),
                class: class.to_string(),
                method: options.user_method.clone(),
            })
    }
}
