//! Resolved schema views.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::SchemaKey;
use crate::ast::Cardinality;

/// A scalar output field and the column it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarField {
    /// Output field name.
    pub name: SmolStr,
    /// Model column.
    pub column: SmolStr,
}

/// One declared nested relationship.
///
/// The target is held as a [`SchemaKey`] and resolved on demand through the
/// resolver's memo, which is what lets schemas reference each other in any
/// order and in cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    /// Output field name.
    pub field: SmolStr,
    /// Model relation the field reads.
    pub relation: SmolStr,
    /// Schema instance used for the related entities.
    pub target: SchemaKey,
    /// Model of the related entities.
    pub target_model: SmolStr,
    /// Single or many.
    pub cardinality: Cardinality,
}

/// Resolved view of one schema instance.
///
/// `scalar_fields` and the keys of `relation_fields` partition the effective
/// output fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNode {
    /// Instance identity.
    pub key: SchemaKey,
    /// Bound model.
    pub model: SmolStr,
    /// Identity columns of the bound model.
    pub identity: Vec<SmolStr>,
    /// Scalar fields in declaration order.
    pub scalar_fields: IndexMap<SmolStr, ScalarField>,
    /// Relation fields in declaration order.
    pub relation_fields: IndexMap<SmolStr, RelationSpec>,
}

impl SchemaNode {
    /// Scalar field names.
    pub fn scalar_names(&self) -> impl Iterator<Item = &str> {
        self.scalar_fields.keys().map(SmolStr::as_str)
    }

    /// Columns needed for this node: scalar columns followed by any identity
    /// column not already listed, without duplicates.
    pub fn columns(&self) -> Vec<SmolStr> {
        let mut columns: Vec<SmolStr> = Vec::with_capacity(self.scalar_fields.len() + 1);
        for column in self
            .scalar_fields
            .values()
            .map(|f| &f.column)
            .chain(self.identity.iter())
        {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        columns
    }

    /// Get a relation field.
    pub fn relation(&self, field: &str) -> Option<&RelationSpec> {
        self.relation_fields.get(field)
    }

    /// Check whether the node has no relation fields.
    pub fn is_leaf(&self) -> bool {
        self.relation_fields.is_empty()
    }
}
