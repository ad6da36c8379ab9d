//! Output schema definitions.
//!
//! A [`SchemaDef`] is the declarative description of an output shape: which
//! fields a serializer emits and, for nested fields, which sub-shape it uses.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Documentation, Span};

/// Reference from a nested field to the schema it serializes with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaRef {
    /// By registered name. The target may be defined after the referencing schema.
    Named(SmolStr),
    /// The schema that declares the field.
    SelfRef,
}

impl SchemaRef {
    /// Reference a schema by name.
    pub fn named(name: impl Into<SmolStr>) -> Self {
        Self::Named(name.into())
    }
}

impl std::fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{}", name),
            Self::SelfRef => write!(f, "self"),
        }
    }
}

/// What a declared field reads from the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    /// A column value read directly from the entity.
    Scalar,
    /// A related entity (or collection) serialized with another schema.
    Nested {
        /// Schema used for the related entities.
        target: SchemaRef,
        /// Explicit cardinality; `None` defers to the model relation.
        many: Option<bool>,
        /// Restrict the nested schema to these fields (dotted paths allowed).
        only: Option<Vec<SmolStr>>,
        /// Remove these fields from the nested schema (dotted paths allowed).
        exclude: Vec<SmolStr>,
    },
}

/// A declared output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Output field name.
    pub name: SmolStr,
    /// Field kind.
    pub kind: FieldKind,
    /// Column or relation read from the entity, when it differs from `name`.
    pub attribute: Option<SmolStr>,
    /// Only used when loading input; never part of the output.
    pub load_only: bool,
    /// Source location.
    pub span: Span,
}

impl FieldDef {
    /// A scalar field reading the column of the same name.
    pub fn scalar(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
            attribute: None,
            load_only: false,
            span: Span::default(),
        }
    }

    /// A nested field whose cardinality comes from the model relation.
    pub fn nested(name: impl Into<SmolStr>, target: impl Into<SmolStr>) -> Self {
        Self::nested_ref(name, SchemaRef::Named(target.into()), None)
    }

    /// A nested collection field (`List(Nested(..))`).
    pub fn list(name: impl Into<SmolStr>, target: impl Into<SmolStr>) -> Self {
        Self::nested_ref(name, SchemaRef::Named(target.into()), Some(true))
    }

    /// A nested field pointing back at the declaring schema.
    pub fn self_ref(name: impl Into<SmolStr>) -> Self {
        Self::nested_ref(name, SchemaRef::SelfRef, None)
    }

    fn nested_ref(name: impl Into<SmolStr>, target: SchemaRef, many: Option<bool>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Nested {
                target,
                many,
                only: None,
                exclude: Vec::new(),
            },
            attribute: None,
            load_only: false,
            span: Span::default(),
        }
    }

    /// Force single cardinality on a nested field.
    pub fn single(self) -> Self {
        self.with_many(false)
    }

    /// Force collection cardinality on a nested field.
    pub fn many(self) -> Self {
        self.with_many(true)
    }

    fn with_many(mut self, value: bool) -> Self {
        if let FieldKind::Nested { many, .. } = &mut self.kind {
            *many = Some(value);
        }
        self
    }

    /// Read from a differently named column or relation.
    pub fn attribute(mut self, attribute: impl Into<SmolStr>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Mark the field as input-only.
    pub fn load_only(mut self) -> Self {
        self.load_only = true;
        self
    }

    /// Restrict the nested schema to the given fields.
    pub fn only(mut self, fields: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        if let FieldKind::Nested { only, .. } = &mut self.kind {
            *only = Some(fields.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Exclude fields from the nested schema.
    pub fn exclude(mut self, fields: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        if let FieldKind::Nested { exclude, .. } = &mut self.kind {
            exclude.extend(fields.into_iter().map(Into::into));
        }
        self
    }

    /// Set the source span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The column or relation name this field reads.
    pub fn source(&self) -> &SmolStr {
        self.attribute.as_ref().unwrap_or(&self.name)
    }

    /// Check if this is a nested field.
    pub fn is_nested(&self) -> bool {
        matches!(self.kind, FieldKind::Nested { .. })
    }
}

/// Schema-level options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaOptions {
    /// Keep only these fields.
    pub fields: Option<Vec<SmolStr>>,
    /// Drop these fields.
    pub exclude: Vec<SmolStr>,
    /// Generate scalar fields for model columns that are not declared.
    pub auto_fields: bool,
    /// Let auto generation include foreign key columns.
    pub include_fk: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            fields: None,
            exclude: Vec::new(),
            auto_fields: true,
            include_fk: false,
        }
    }
}

/// A schema definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    /// Schema name (registry key).
    pub name: SmolStr,
    /// Model the schema is bound to; inherited from `extends` when absent.
    pub model: Option<SmolStr>,
    /// Base schema whose fields are inherited.
    pub extends: Option<SmolStr>,
    /// Declared fields in order.
    pub fields: IndexMap<SmolStr, FieldDef>,
    /// Options.
    pub options: SchemaOptions,
    /// Documentation comment.
    pub documentation: Option<Documentation>,
    /// Source location.
    pub span: Span,
}

impl SchemaDef {
    /// Create an empty schema definition.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            model: None,
            extends: None,
            fields: IndexMap::new(),
            options: SchemaOptions::default(),
            documentation: None,
            span: Span::default(),
        }
    }

    /// Get the schema name as a string.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind to a model.
    pub fn for_model(mut self, model: impl Into<SmolStr>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Inherit from a base schema.
    pub fn extends(mut self, base: impl Into<SmolStr>) -> Self {
        self.extends = Some(base.into());
        self
    }

    /// Declare a field (builder style). Redeclaring a name replaces it in place.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.add_field(field);
        self
    }

    /// Declare a field.
    pub fn add_field(&mut self, field: FieldDef) {
        self.fields.insert(field.name.clone(), field);
    }

    /// Keep only the given fields.
    pub fn only(mut self, fields: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.options.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Exclude the given fields.
    pub fn exclude(mut self, fields: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.options.exclude.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Disable auto-generated column fields.
    pub fn no_auto_fields(mut self) -> Self {
        self.options.auto_fields = false;
        self
    }

    /// Include foreign key columns in auto-generated fields.
    pub fn include_fk(mut self) -> Self {
        self.options.include_fk = true;
        self
    }

    /// Get a declared field.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Set documentation.
    pub fn with_documentation(mut self, doc: Documentation) -> Self {
        self.documentation = Some(doc);
        self
    }
}
