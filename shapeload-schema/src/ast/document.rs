//! A parsed definition document: models plus schemas.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Model, SchemaDef};

/// The contents of one or more `.shape` sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Models in declaration order.
    pub models: IndexMap<SmolStr, Model>,
    /// Schemas in declaration order.
    pub schemas: IndexMap<SmolStr, SchemaDef>,
    /// Names declared more than once, in the order the repeats were seen.
    pub duplicates: Vec<(SmolStr, SmolStr)>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model. A repeated name is recorded and the first definition kept.
    pub fn add_model(&mut self, model: Model) {
        if self.models.contains_key(&model.name) {
            self.duplicates.push((SmolStr::new_static("model"), model.name));
        } else {
            self.models.insert(model.name.clone(), model);
        }
    }

    /// Add a schema. A repeated name is recorded and the first definition kept.
    pub fn add_schema(&mut self, schema: SchemaDef) {
        if self.schemas.contains_key(&schema.name) {
            self.duplicates.push((SmolStr::new_static("schema"), schema.name));
        } else {
            self.schemas.insert(schema.name.clone(), schema);
        }
    }

    /// Get a model by name.
    pub fn get_model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    /// Get a schema by name.
    pub fn get_schema(&self, name: &str) -> Option<&SchemaDef> {
        self.schemas.get(name)
    }

    /// Merge another document into this one.
    pub fn merge(&mut self, other: Document) {
        self.duplicates.extend(other.duplicates);
        for model in other.models.into_values() {
            self.add_model(model);
        }
        for schema in other.schemas.into_values() {
            self.add_schema(schema);
        }
    }
}
