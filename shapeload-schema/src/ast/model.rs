//! Model metadata: the storage-side shape a schema is bound to.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Documentation, ScalarType, Span};

/// Whether a relation yields one related entity or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// A single related entity (many-to-one, one-to-one).
    One,
    /// A collection of related entities (one-to-many, many-to-many).
    Many,
}

impl Cardinality {
    /// Check if this relation returns multiple records.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many)
    }

    /// Check if this relation returns a single record.
    pub fn is_one(&self) -> bool {
        matches!(self, Self::One)
    }

    /// Build from a `many` flag.
    pub fn from_many(many: bool) -> Self {
        if many { Self::Many } else { Self::One }
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::One => write!(f, "one"),
            Self::Many => write!(f, "many"),
        }
    }
}

/// A stored column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: SmolStr,
    /// Scalar type.
    pub scalar: ScalarType,
    /// Part of the primary identity.
    pub is_id: bool,
    /// Foreign key column (skipped by auto-generated schema fields unless `include_fk`).
    pub is_foreign: bool,
    /// Source location.
    pub span: Span,
}

impl Column {
    /// Create a plain column.
    pub fn new(name: impl Into<SmolStr>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar,
            is_id: false,
            is_foreign: false,
            span: Span::default(),
        }
    }

    /// Mark this column as (part of) the identity.
    pub fn id(mut self) -> Self {
        self.is_id = true;
        self
    }

    /// Mark this column as a foreign key.
    pub fn foreign(mut self) -> Self {
        self.is_foreign = true;
        self
    }

    /// Set the source span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// How a relation joins its owner to its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Join {
    /// `owner.local = target.identity` (many-to-one).
    ForeignKey {
        /// Foreign key column on the owner.
        local: SmolStr,
    },
    /// `target.remote = owner.identity` (one-to-many, one-to-one).
    Referenced {
        /// Column on the target pointing back at the owner.
        remote: SmolStr,
    },
    /// Many-to-many through a link model:
    /// `link.local = owner.identity` and `link.remote = target.identity`.
    Through {
        /// Link model name.
        link: SmolStr,
        /// Link column referencing the owner.
        local: SmolStr,
        /// Link column referencing the target.
        remote: SmolStr,
    },
}

impl Join {
    /// Short description used in logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Self::ForeignKey { local } => format!("fk({})", local),
            Self::Referenced { remote } => format!("ref({})", remote),
            Self::Through {
                link,
                local,
                remote,
            } => format!("through {}({}, {})", link, local, remote),
        }
    }
}

/// A relationship declared on a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRelation {
    /// Relation name (attribute on the owning model).
    pub name: SmolStr,
    /// Target model name.
    pub target: SmolStr,
    /// Cardinality, when the binding declares it.
    pub cardinality: Option<Cardinality>,
    /// Join description.
    pub join: Join,
    /// Extra equality predicates on the target.
    pub conditions: IndexMap<SmolStr, serde_json::Value>,
    /// Source location.
    pub span: Span,
}

impl ModelRelation {
    /// Create a relation without a declared cardinality.
    pub fn new(name: impl Into<SmolStr>, target: impl Into<SmolStr>, join: Join) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: None,
            join,
            conditions: IndexMap::new(),
            span: Span::default(),
        }
    }

    /// Many-to-one through a foreign key on the owner.
    pub fn many_to_one(
        name: impl Into<SmolStr>,
        target: impl Into<SmolStr>,
        local: impl Into<SmolStr>,
    ) -> Self {
        Self::new(name, target, Join::ForeignKey { local: local.into() })
            .with_cardinality(Cardinality::One)
    }

    /// One-to-many through a column on the target.
    pub fn one_to_many(
        name: impl Into<SmolStr>,
        target: impl Into<SmolStr>,
        remote: impl Into<SmolStr>,
    ) -> Self {
        Self::new(name, target, Join::Referenced { remote: remote.into() })
            .with_cardinality(Cardinality::Many)
    }

    /// One-to-one through a column on the target.
    pub fn one_to_one(
        name: impl Into<SmolStr>,
        target: impl Into<SmolStr>,
        remote: impl Into<SmolStr>,
    ) -> Self {
        Self::new(name, target, Join::Referenced { remote: remote.into() })
            .with_cardinality(Cardinality::One)
    }

    /// Many-to-many through a link model.
    pub fn many_to_many(
        name: impl Into<SmolStr>,
        target: impl Into<SmolStr>,
        link: impl Into<SmolStr>,
        local: impl Into<SmolStr>,
        remote: impl Into<SmolStr>,
    ) -> Self {
        Self::new(
            name,
            target,
            Join::Through {
                link: link.into(),
                local: local.into(),
                remote: remote.into(),
            },
        )
        .with_cardinality(Cardinality::Many)
    }

    /// Set the cardinality.
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    /// Restrict the target to rows where `column == value`.
    pub fn with_condition(
        mut self,
        column: impl Into<SmolStr>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.conditions.insert(column.into(), value.into());
        self
    }

    /// Set the source span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// A model definition (maps to a stored table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model name.
    pub name: SmolStr,
    /// Table name.
    pub table: SmolStr,
    /// Columns in declaration order.
    pub columns: IndexMap<SmolStr, Column>,
    /// Relations in declaration order.
    pub relations: IndexMap<SmolStr, ModelRelation>,
    /// Documentation comment.
    pub documentation: Option<Documentation>,
    /// Source location.
    pub span: Span,
}

impl Model {
    /// Create a new model whose table is the lowercased model name.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        let name = name.into();
        Self {
            table: SmolStr::new(name.to_lowercase()),
            name,
            columns: IndexMap::new(),
            relations: IndexMap::new(),
            documentation: None,
            span: Span::default(),
        }
    }

    /// Get the model name as a string.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Override the table name.
    pub fn with_table(mut self, table: impl Into<SmolStr>) -> Self {
        self.table = table.into();
        self
    }

    /// Add a column (builder style).
    pub fn column(mut self, column: Column) -> Self {
        self.add_column(column);
        self
    }

    /// Add a relation (builder style).
    pub fn relation(mut self, relation: ModelRelation) -> Self {
        self.add_relation(relation);
        self
    }

    /// Add a column.
    pub fn add_column(&mut self, column: Column) {
        self.columns.insert(column.name.clone(), column);
    }

    /// Add a relation.
    pub fn add_relation(&mut self, relation: ModelRelation) {
        self.relations.insert(relation.name.clone(), relation);
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Get a relation by name.
    pub fn get_relation(&self, name: &str) -> Option<&ModelRelation> {
        self.relations.get(name)
    }

    /// Identity column names in declaration order.
    pub fn identity(&self) -> Vec<SmolStr> {
        self.columns
            .values()
            .filter(|c| c.is_id)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Set documentation.
    pub fn with_documentation(mut self, doc: Documentation) -> Self {
        self.documentation = Some(doc);
        self
    }
}
