//! Error types for definition parsing, registration and graph resolution.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for parsing and registration.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for schema graph resolution.
pub type ResolveResult<T> = Result<T, ResolutionError>;

/// Errors raised while reading definitions or building a registry.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(shapeload::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Syntax error in a definition file.
    #[error("syntax error in definitions")]
    #[diagnostic(code(shapeload::schema::syntax_error))]
    SyntaxError {
        #[source_code]
        src: String,
        #[label("{message}")]
        span: miette::SourceSpan,
        message: String,
    },

    /// Invalid attribute usage.
    #[error("invalid attribute `@{attribute}`: {message}")]
    #[diagnostic(code(shapeload::schema::invalid_attribute))]
    InvalidAttribute { attribute: String, message: String },

    /// Duplicate definition.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(code(shapeload::schema::duplicate))]
    Duplicate { kind: String, name: String },

    /// A schema is bound to a model that does not exist.
    #[error("schema `{schema}` is bound to unknown model `{model}`")]
    #[diagnostic(code(shapeload::schema::unknown_model))]
    UnknownModel { schema: String, model: String },

    /// A schema extends a schema that does not exist.
    #[error("schema `{schema}` extends unknown schema `{base}`")]
    #[diagnostic(code(shapeload::schema::unknown_base))]
    UnknownBase { schema: String, base: String },

    /// A relation points at a model that does not exist.
    #[error("relation `{model}.{relation}` targets unknown model `{target}`")]
    #[diagnostic(code(shapeload::schema::unknown_target))]
    UnknownTarget {
        model: String,
        relation: String,
        target: String,
    },

    /// A relation join names a column that does not exist.
    #[error("relation `{model}.{relation}` joins on unknown column `{owner}.{column}`")]
    #[diagnostic(code(shapeload::schema::unknown_join_column))]
    UnknownJoinColumn {
        model: String,
        relation: String,
        owner: String,
        column: String,
    },

    /// A model has no identity column.
    #[error("model `{model}` has no `@id` column")]
    #[diagnostic(
        code(shapeload::schema::missing_identity),
        help("entities must be loadable by identity; mark the primary key column with `@id`")
    )]
    MissingIdentity { model: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(shapeload::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(shapeload::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },

    /// Validation error with multiple issues.
    #[error("registry validation failed with {count} error(s)")]
    #[diagnostic(code(shapeload::schema::validation_failed))]
    ValidationFailed {
        count: usize,
        #[related]
        errors: Vec<SchemaError>,
    },
}

impl SchemaError {
    /// Create a syntax error with source location.
    pub fn syntax(
        src: impl Into<String>,
        offset: usize,
        len: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::SyntaxError {
            src: src.into(),
            span: (offset, len).into(),
            message: message.into(),
        }
    }

    /// Create an invalid attribute error.
    pub fn invalid_attribute(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate definition error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Errors raised while resolving a schema graph.
///
/// All of these surface at plan-build time; a plan that was built never
/// raises them later.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ResolutionError {
    /// The requested root schema is not registered.
    #[error("unknown schema `{name}`")]
    #[diagnostic(code(shapeload::resolve::unknown_schema))]
    UnknownSchema { name: String },

    /// A nested field names a schema that is not registered.
    #[error("field `{schema}.{field}` refers to unknown schema `{reference}`")]
    #[diagnostic(
        code(shapeload::resolve::unresolved_reference),
        help("register `{reference}` before building plans that reach it")
    )]
    UnresolvedReference {
        schema: String,
        field: String,
        reference: String,
    },

    /// Neither the field nor the model relation declares a cardinality.
    #[error("cannot determine cardinality of `{schema}.{field}`")]
    #[diagnostic(
        code(shapeload::resolve::undetermined_cardinality),
        help("declare the field as a list, or give the model relation a cardinality")
    )]
    UndeterminedCardinality { schema: String, field: String },

    /// An `only`/`exclude` filter names a field the schema does not declare.
    #[error("`{option}` on `{schema}` names unknown field `{field}`")]
    #[diagnostic(code(shapeload::resolve::unknown_field))]
    UnknownField {
        schema: String,
        field: String,
        option: String,
    },

    /// A dotted filter path descends into a field that is not nested.
    #[error("`{schema}.{field}` is not a nested field; cannot filter `{path}`")]
    #[diagnostic(code(shapeload::resolve::not_nested))]
    NotNested {
        schema: String,
        field: String,
        path: String,
    },

    /// A scalar field reads a column the model does not have.
    #[error("field `{schema}.{field}` reads unknown column `{model}.{column}`")]
    #[diagnostic(code(shapeload::resolve::unknown_column))]
    UnknownColumn {
        schema: String,
        field: String,
        model: String,
        column: String,
    },

    /// A nested field reads a relation the model does not have.
    #[error("field `{schema}.{field}` reads unknown relation `{model}.{relation}`")]
    #[diagnostic(code(shapeload::resolve::unknown_relation))]
    UnknownRelation {
        schema: String,
        field: String,
        model: String,
        relation: String,
    },

    /// A nested schema is bound to a different model than the relation target.
    #[error("field `{schema}.{field}` loads `{expected}` but schema `{target}` is bound to `{found}`")]
    #[diagnostic(code(shapeload::resolve::model_mismatch))]
    ModelMismatch {
        schema: String,
        field: String,
        target: String,
        expected: String,
        found: String,
    },

    /// Two fields of one schema read the same relation as both one and many.
    #[error("fields `{schema}.{first}` and `{schema}.{second}` read relation `{relation}` with different cardinalities")]
    #[diagnostic(
        code(shapeload::resolve::cardinality_conflict),
        help("give both fields the same `@many` or `@single`")
    )]
    CardinalityConflict {
        schema: String,
        relation: String,
        first: String,
        second: String,
    },

    /// Neither the schema nor any base binds a model.
    #[error("schema `{schema}` is not bound to a model")]
    #[diagnostic(code(shapeload::resolve::unbound_model))]
    UnboundModel { schema: String },

    /// A schema is bound to a model that is not registered.
    #[error("schema `{schema}` is bound to unknown model `{model}`")]
    #[diagnostic(code(shapeload::resolve::unknown_model))]
    UnknownModel { schema: String, model: String },

    /// The `extends` chain loops back on itself.
    #[error("schema inheritance cycle: {chain}")]
    #[diagnostic(code(shapeload::resolve::extends_cycle))]
    ExtendsCycle { schema: String, chain: String },
}

impl ResolutionError {
    /// The schema the error was raised for.
    pub fn schema(&self) -> &str {
        match self {
            Self::UnknownSchema { name } => name,
            Self::UnresolvedReference { schema, .. }
            | Self::UndeterminedCardinality { schema, .. }
            | Self::UnknownField { schema, .. }
            | Self::NotNested { schema, .. }
            | Self::UnknownColumn { schema, .. }
            | Self::UnknownRelation { schema, .. }
            | Self::ModelMismatch { schema, .. }
            | Self::CardinalityConflict { schema, .. }
            | Self::UnboundModel { schema }
            | Self::UnknownModel { schema, .. }
            | Self::ExtendsCycle { schema, .. } => schema,
        }
    }

    /// The offending field, when the error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::UnresolvedReference { field, .. }
            | Self::UndeterminedCardinality { field, .. }
            | Self::UnknownField { field, .. }
            | Self::NotNested { field, .. }
            | Self::UnknownColumn { field, .. }
            | Self::UnknownRelation { field, .. }
            | Self::ModelMismatch { field, .. } => Some(field),
            Self::CardinalityConflict { second, .. } => Some(second),
            _ => None,
        }
    }
}
