//! Registry validation.
//!
//! Checks a [`Document`] for the problems that would make model metadata
//! unusable for planning:
//! - duplicate model or schema names
//! - models without an identity column
//! - relations pointing at unknown models or joining on unknown columns
//! - schemas bound to unknown models or extending unknown schemas
//!
//! Nested schema references are left alone; they may be forward references and
//! are resolved when a plan first reaches them.

use crate::ast::*;
use crate::error::{SchemaError, SchemaResult};

/// Document validator.
#[derive(Debug)]
pub struct Validator {
    /// Collected validation errors.
    errors: Vec<SchemaError>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Create a new validator.
    pub fn new() -> Self {
        Self { errors: vec![] }
    }

    /// Validate a document and return it, or every problem found.
    pub fn validate(&mut self, doc: Document) -> SchemaResult<Document> {
        self.errors.clear();

        for (kind, name) in &doc.duplicates {
            self.errors.push(SchemaError::duplicate(kind.as_str(), name.as_str()));
        }

        for model in doc.models.values() {
            self.validate_model(model, &doc);
        }

        for schema in doc.schemas.values() {
            self.validate_schema(schema, &doc);
        }

        if self.errors.is_empty() {
            Ok(doc)
        } else {
            Err(SchemaError::ValidationFailed {
                count: self.errors.len(),
                errors: std::mem::take(&mut self.errors),
            })
        }
    }

    fn validate_model(&mut self, model: &Model, doc: &Document) {
        if model.identity().is_empty() {
            self.errors.push(SchemaError::MissingIdentity {
                model: model.name().to_string(),
            });
        }

        for relation in model.relations.values() {
            self.validate_relation(model, relation, doc);
        }
    }

    fn validate_relation(&mut self, model: &Model, relation: &ModelRelation, doc: &Document) {
        let Some(target) = doc.get_model(&relation.target) else {
            self.errors.push(SchemaError::UnknownTarget {
                model: model.name().to_string(),
                relation: relation.name.to_string(),
                target: relation.target.to_string(),
            });
            return;
        };

        match &relation.join {
            Join::ForeignKey { local } => self.require_column(model, relation, model, local),
            Join::Referenced { remote } => self.require_column(model, relation, target, remote),
            Join::Through {
                link,
                local,
                remote,
            } => match doc.get_model(link) {
                Some(link_model) => {
                    self.require_column(model, relation, link_model, local);
                    self.require_column(model, relation, link_model, remote);
                }
                None => self.errors.push(SchemaError::UnknownTarget {
                    model: model.name().to_string(),
                    relation: relation.name.to_string(),
                    target: link.to_string(),
                }),
            },
        }

        for column in relation.conditions.keys() {
            self.require_column(model, relation, target, column);
        }
    }

    fn require_column(
        &mut self,
        model: &Model,
        relation: &ModelRelation,
        owner: &Model,
        column: &str,
    ) {
        if owner.get_column(column).is_none() {
            self.errors.push(SchemaError::UnknownJoinColumn {
                model: model.name().to_string(),
                relation: relation.name.to_string(),
                owner: owner.name().to_string(),
                column: column.to_string(),
            });
        }
    }

    fn validate_schema(&mut self, schema: &SchemaDef, doc: &Document) {
        if let Some(model) = &schema.model {
            if doc.get_model(model).is_none() {
                self.errors.push(SchemaError::UnknownModel {
                    schema: schema.name().to_string(),
                    model: model.to_string(),
                });
            }
        }

        if let Some(base) = &schema.extends {
            if doc.get_schema(base).is_none() {
                self.errors.push(SchemaError::UnknownBase {
                    schema: schema.name().to_string(),
                    base: base.to_string(),
                });
            }
        }
    }
}

/// Parse and validate a definition document in one step.
pub fn validate_document(input: &str) -> SchemaResult<Document> {
    let doc = crate::parser::parse_document(input)?;
    Validator::new().validate(doc)
}
