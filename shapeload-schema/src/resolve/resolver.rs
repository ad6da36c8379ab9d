//! The schema graph resolver.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smol_str::SmolStr;
use tracing::trace;

use super::effective::{bound_model, effective_schema};
use super::{RelationSpec, ScalarField, SchemaKey, SchemaNode};
use crate::ast::{Cardinality, FieldKind, SchemaRef};
use crate::error::{ResolutionError, ResolveResult};
use crate::registry::SchemaRegistry;

/// Resolves schema instances into [`SchemaNode`]s against a registry.
///
/// Nodes are memoized per [`SchemaKey`]; the memo is the only state the
/// resolver mutates. Relation targets are not resolved eagerly: a
/// [`RelationSpec`] names its target by key and [`Resolver::target`] resolves it
/// on first use.
#[derive(Debug)]
pub struct Resolver {
    registry: Arc<SchemaRegistry>,
    memo: RwLock<HashMap<SchemaKey, Arc<SchemaNode>>>,
}

impl Resolver {
    /// Create a resolver over a built registry.
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// The registry this resolver reads.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Resolve a schema instance.
    pub fn resolve(&self, key: &SchemaKey) -> ResolveResult<Arc<SchemaNode>> {
        if let Some(node) = self.memo.read().get(key) {
            return Ok(Arc::clone(node));
        }

        let node = Arc::new(self.build_node(key)?);
        trace!(schema = %key, model = %node.model, "Resolved schema");

        // A concurrent resolution of the same key may have won; keep the first.
        let mut memo = self.memo.write();
        Ok(Arc::clone(memo.entry(key.clone()).or_insert(node)))
    }

    /// Resolve an unfiltered schema by name.
    pub fn resolve_name(&self, name: &str) -> ResolveResult<Arc<SchemaNode>> {
        self.resolve(&SchemaKey::new(name))
    }

    /// Resolve the schema a relation points at.
    pub fn target(&self, spec: &RelationSpec) -> ResolveResult<Arc<SchemaNode>> {
        self.resolve(&spec.target)
    }

    /// Number of memoized nodes.
    pub fn memoized(&self) -> usize {
        self.memo.read().len()
    }

    fn build_node(&self, key: &SchemaKey) -> ResolveResult<SchemaNode> {
        if !self.registry.contains_schema(&key.name) {
            return Err(ResolutionError::UnknownSchema {
                name: key.name.to_string(),
            });
        }

        let effective = effective_schema(&self.registry, key)?;
        let model = effective.model;

        let mut scalar_fields = IndexMap::new();
        let mut relation_fields = IndexMap::new();

        for field in effective.fields {
            let def = field.def;
            match &def.kind {
                FieldKind::Scalar => {
                    let column = def.source();
                    if model.get_column(column).is_none() {
                        return Err(ResolutionError::UnknownColumn {
                            schema: key.name.to_string(),
                            field: def.name.to_string(),
                            model: model.name().to_string(),
                            column: column.to_string(),
                        });
                    }
                    scalar_fields.insert(
                        def.name.clone(),
                        ScalarField {
                            name: def.name.clone(),
                            column: column.clone(),
                        },
                    );
                }
                FieldKind::Nested { target, many, .. } => {
                    let relation_name = def.source();
                    let relation = model.get_relation(relation_name).ok_or_else(|| {
                        ResolutionError::UnknownRelation {
                            schema: key.name.to_string(),
                            field: def.name.to_string(),
                            model: model.name().to_string(),
                            relation: relation_name.to_string(),
                        }
                    })?;

                    let target_name: SmolStr = match target {
                        SchemaRef::Named(name) => name.clone(),
                        SchemaRef::SelfRef => key.name.clone(),
                    };
                    if !self.registry.contains_schema(&target_name) {
                        return Err(ResolutionError::UnresolvedReference {
                            schema: key.name.to_string(),
                            field: def.name.to_string(),
                            reference: target_name.to_string(),
                        });
                    }

                    let target_model = bound_model(&self.registry, &target_name)?;
                    if target_model.name != relation.target {
                        return Err(ResolutionError::ModelMismatch {
                            schema: key.name.to_string(),
                            field: def.name.to_string(),
                            target: target_name.to_string(),
                            expected: relation.target.to_string(),
                            found: target_model.name.to_string(),
                        });
                    }

                    // An explicit `many` on the field wins over the model binding.
                    let cardinality = many
                        .map(Cardinality::from_many)
                        .or(relation.cardinality)
                        .ok_or_else(|| ResolutionError::UndeterminedCardinality {
                            schema: key.name.to_string(),
                            field: def.name.to_string(),
                        })?;

                    relation_fields.insert(
                        def.name.clone(),
                        RelationSpec {
                            field: def.name.clone(),
                            relation: relation.name.clone(),
                            target: SchemaKey {
                                name: target_name,
                                only: field.only,
                                exclude: field.exclude,
                            },
                            target_model: relation.target.clone(),
                            cardinality,
                        },
                    );
                }
            }
        }

        Ok(SchemaNode {
            key: key.clone(),
            model: model.name.clone(),
            identity: model.identity(),
            scalar_fields,
            relation_fields,
        })
    }
}
