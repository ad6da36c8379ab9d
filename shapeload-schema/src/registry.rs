//! The schema registry.
//!
//! A [`SchemaRegistry`] is populated once at definition time and is read-only
//! afterwards; [`RegistryBuilder::build`] validates the collected definitions and
//! hands out an `Arc` that any number of threads can resolve against without
//! locking.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::ast::*;
use crate::error::SchemaResult;
use crate::parser::{parse_document, parse_document_file};
use crate::validator::Validator;

/// Immutable collection of models and schema definitions.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    models: IndexMap<SmolStr, Model>,
    schemas: IndexMap<SmolStr, SchemaDef>,
}

impl SchemaRegistry {
    /// Start collecting definitions.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Parse, validate and build a registry from `.shape` source.
    pub fn from_source(input: &str) -> SchemaResult<Arc<Self>> {
        Self::builder().source(input)?.build()
    }

    /// Parse, validate and build a registry from a `.shape` file.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Arc<Self>> {
        Self::builder().file(path)?.build()
    }

    /// Get a model by name.
    pub fn get_model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    /// Get a schema definition by name.
    pub fn get_schema(&self, name: &str) -> Option<&SchemaDef> {
        self.schemas.get(name)
    }

    /// Check whether a schema is registered.
    pub fn contains_schema(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Models in registration order.
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    /// Schema definitions in registration order.
    pub fn schemas(&self) -> impl Iterator<Item = &SchemaDef> {
        self.schemas.values()
    }
}

/// Collects definitions before they are validated and frozen.
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    doc: Document,
}

impl RegistryBuilder {
    /// Register a model.
    pub fn model(mut self, model: Model) -> Self {
        self.doc.add_model(model);
        self
    }

    /// Register a schema definition.
    pub fn schema(mut self, schema: SchemaDef) -> Self {
        self.doc.add_schema(schema);
        self
    }

    /// Register everything in an already parsed document.
    pub fn document(mut self, doc: Document) -> Self {
        self.doc.merge(doc);
        self
    }

    /// Parse `.shape` source and register its definitions.
    pub fn source(self, input: &str) -> SchemaResult<Self> {
        Ok(self.document(parse_document(input)?))
    }

    /// Parse a `.shape` file and register its definitions.
    pub fn file(self, path: impl AsRef<Path>) -> SchemaResult<Self> {
        Ok(self.document(parse_document_file(path)?))
    }

    /// Validate and freeze.
    pub fn build(self) -> SchemaResult<Arc<SchemaRegistry>> {
        let doc = Validator::new().validate(self.doc)?;
        debug!(
            models = doc.models.len(),
            schemas = doc.schemas.len(),
            "Schema registry built"
        );
        Ok(Arc::new(SchemaRegistry {
            models: doc.models,
            schemas: doc.schemas,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;

    #[test]
    fn test_builder_api() {
        let registry = SchemaRegistry::builder()
            .model(Model::new("User").column(Column::new("id", ScalarType::Int).id()))
            .schema(SchemaDef::new("UserSchema").for_model("User"))
            .build()
            .unwrap();

        assert!(registry.get_model("User").is_some());
        assert!(registry.contains_schema("UserSchema"));
        assert!(!registry.contains_schema("Missing"));
        assert_eq!(registry.models().count(), 1);
    }

    #[test]
    fn test_mixed_sources() {
        let registry = SchemaRegistry::builder()
            .source("model User { id Int @id }")
            .unwrap()
            .schema(SchemaDef::new("UserSchema").for_model("User"))
            .build()
            .unwrap();

        assert_eq!(registry.schemas().count(), 1);
    }

    #[test]
    fn test_build_validates() {
        let err = SchemaRegistry::builder()
            .model(Model::new("User"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::ValidationFailed { count: 1, .. }));
    }

    #[test]
    fn test_registry_is_shareable() {
        let registry = SchemaRegistry::from_source("model User { id Int @id }").unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get_model("User").is_some())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
