//! Error types for planning, applying and executing load plans.
//!
//! Two failure families are raised synchronously by this crate:
//! - [`ResolutionError`] while a schema graph is resolved into a plan
//! - [`PlanApplicationError`] while a plan is installed on a query
//!
//! Both convert into [`SelectError`], which carries an [`ErrorCode`], a
//! message and actionable context, in the same shape for every failure
//! including those raised later by a query collaborator (an unplanned load).
//!
//! # Error Codes
//!
//! Error codes follow a pattern: S{category}{number}
//! - 1xxx: Resolution errors (unknown schema, undeterminable cardinality, etc.)
//! - 2xxx: Plan application errors (unsupported directive, unknown path)
//! - 3xxx: Execution errors (unplanned load, record not found)
//! - 7xxx: Configuration and definition errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use shapeload_query::ErrorCode;
//!
//! assert_eq!(ErrorCode::UnresolvedReference.code(), "S1002");
//! assert_eq!(ErrorCode::UnplannedLoad.code(), "S3001");
//! ```

use std::fmt;

use thiserror::Error;

use crate::apply::Directive;
use crate::plan::RelationPath;
use shapeload_schema::{ResolutionError, SchemaError};

/// Result type for operations that can return a [`SelectError`].
pub type SelectResult<T> = Result<T, SelectError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Resolution errors (1xxx)
    /// Unknown root schema (S1001).
    UnknownSchema = 1001,
    /// Nested reference to an unregistered schema (S1002).
    UnresolvedReference = 1002,
    /// Relation cardinality cannot be determined (S1003).
    UndeterminedCardinality = 1003,
    /// Invalid only/exclude filter (S1004).
    InvalidFilter = 1004,
    /// Scalar field reads an unknown column (S1005).
    UnknownColumn = 1005,
    /// Nested field reads an unknown relation (S1006).
    UnknownRelation = 1006,
    /// Schema is not bound to a usable model (S1007).
    InvalidBinding = 1007,
    /// Fields reading one relation disagree on its cardinality (S1008).
    CardinalityConflict = 1008,

    // Plan application errors (2xxx)
    /// The query cannot express a directive (S2001).
    UnsupportedDirective = 2001,
    /// A directive names a path the query does not know (S2002).
    UnknownPath = 2002,

    // Execution errors (3xxx)
    /// Access to a relation or column the plan did not load (S3001).
    UnplannedLoad = 3001,
    /// Record not found (S3002).
    RecordNotFound = 3002,
    /// Query execution failed (S3003).
    ExecutionFailed = 3003,

    // Configuration errors (7xxx)
    /// Invalid configuration (S7001).
    InvalidConfiguration = 7001,
    /// Invalid definition document (S7002).
    InvalidDefinition = 7002,

    // Internal errors (9xxx)
    /// Internal error (S9001).
    Internal = 9001,
    /// Unknown error (S9999).
    Unknown = 9999,
}

impl ErrorCode {
    /// Get the error code string (e.g., "S1001").
    pub fn code(&self) -> String {
        format!("S{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownSchema => "Unknown schema",
            Self::UnresolvedReference => "Unresolved schema reference",
            Self::UndeterminedCardinality => "Undetermined relation cardinality",
            Self::InvalidFilter => "Invalid field filter",
            Self::UnknownColumn => "Unknown column",
            Self::UnknownRelation => "Unknown relation",
            Self::InvalidBinding => "Invalid model binding",
            Self::CardinalityConflict => "Conflicting relation cardinality",
            Self::UnsupportedDirective => "Unsupported load directive",
            Self::UnknownPath => "Unknown relation path",
            Self::UnplannedLoad => "Unplanned load",
            Self::RecordNotFound => "Record not found",
            Self::ExecutionFailed => "Query execution failed",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::InvalidDefinition => "Invalid definition",
            Self::Internal => "Internal error",
            Self::Unknown => "Unknown error",
        }
    }

    /// Check if this code belongs to the resolution family.
    pub fn is_resolution(&self) -> bool {
        (1000..2000).contains(&(*self as u16))
    }

    /// Check if this code belongs to the plan application family.
    pub fn is_application(&self) -> bool {
        (2000..3000).contains(&(*self as u16))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The schema involved.
    pub schema: Option<String>,
    /// The schema field involved.
    pub field: Option<String>,
    /// The model involved.
    pub model: Option<String>,
    /// The relation path involved.
    pub path: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

impl ErrorContext {
    /// Create new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operation.
    pub fn operation(mut self, op: impl Into<String>) -> Self {
        self.operation = Some(op.into());
        self
    }

    /// Set the schema.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the relation path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a text suggestion.
    pub fn suggest(mut self, text: impl Into<String>) -> Self {
        self.suggestions.push(Suggestion::new(text));
        self
    }

    /// Set help text.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Errors surfaced by the planner, the applier and the reference store.
#[derive(Error, Debug)]
pub struct SelectError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl SelectError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a suggestion with a code example.
    pub fn with_code_suggestion(mut self, text: impl Into<String>, code: impl Into<String>) -> Self {
        self.context
            .suggestions
            .push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.context.schema = Some(schema.into());
        self
    }

    /// Set the schema field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the relation path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.context.path = Some(path.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Specific Error Constructors ==============

    /// Access to a relation or column that no directive covered.
    pub fn unplanned_load(model: impl Into<String>, name: impl Into<String>) -> Self {
        let model = model.into();
        let name = name.into();
        Self::new(
            ErrorCode::UnplannedLoad,
            format!("'{}.{}' is not loaded and further loads are forbidden", model, name),
        )
        .with_model(model)
        .with_field(name)
        .with_suggestion("Declare the field on the schema used to build the plan")
        .with_help("Plans built with enforcement forbid every load they did not install")
    }

    /// A record looked up by identity does not exist.
    pub fn not_found(model: impl Into<String>, id: impl fmt::Display) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No '{}' record with identity {}", model, id),
        )
        .with_model(model)
    }

    /// Query execution failed.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExecutionFailed, message)
    }

    /// Invalid configuration.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    /// Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message))
            .with_help("This is likely a bug in Shapeload - please report it")
    }

    // ============== Error Checks ==============

    /// Check if this error was raised while resolving a schema graph.
    pub fn is_resolution_error(&self) -> bool {
        self.code.is_resolution()
    }

    /// Check if this error was raised while applying a plan.
    pub fn is_application_error(&self) -> bool {
        self.code.is_application()
    }

    /// Check if this is an unplanned load.
    pub fn is_unplanned_load(&self) -> bool {
        self.code == ErrorCode::UnplannedLoad
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound
    }

    // ============== Display Functions ==============

    /// Get the error code.
    pub fn error_code(&self) -> &ErrorCode {
        &self.code
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref schema) = self.context.schema {
            output.push_str(&format!("  → Schema: {}\n", schema));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }
        if let Some(ref model) = self.context.model {
            output.push_str(&format!("  → Model: {}\n", model));
        }
        if let Some(ref path) = self.context.path {
            output.push_str(&format!("  → Path: {}\n", path));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    output.push_str(&format!(
                        "     ```\n     {}\n     ```\n",
                        code.replace('\n', "\n     ")
                    ));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

impl From<ResolutionError> for SelectError {
    fn from(err: ResolutionError) -> Self {
        let code = match &err {
            ResolutionError::UnknownSchema { .. } => ErrorCode::UnknownSchema,
            ResolutionError::UnresolvedReference { .. } => ErrorCode::UnresolvedReference,
            ResolutionError::UndeterminedCardinality { .. } => ErrorCode::UndeterminedCardinality,
            ResolutionError::UnknownField { .. } | ResolutionError::NotNested { .. } => {
                ErrorCode::InvalidFilter
            }
            ResolutionError::UnknownColumn { .. } => ErrorCode::UnknownColumn,
            ResolutionError::UnknownRelation { .. } => ErrorCode::UnknownRelation,
            ResolutionError::CardinalityConflict { .. } => ErrorCode::CardinalityConflict,
            ResolutionError::ModelMismatch { .. }
            | ResolutionError::UnboundModel { .. }
            | ResolutionError::UnknownModel { .. }
            | ResolutionError::ExtendsCycle { .. } => ErrorCode::InvalidBinding,
        };

        let mut select = Self::new(code, err.to_string())
            .with_context("Resolving schema graph")
            .with_schema(err.schema());
        if let Some(field) = err.field() {
            select = select.with_field(field);
        }
        if code == ErrorCode::UndeterminedCardinality {
            select = select.with_suggestion("Mark the field `@many` or `@single`, or give the model relation a cardinality");
        }
        select.with_source(err)
    }
}

impl From<PlanApplicationError> for SelectError {
    fn from(err: PlanApplicationError) -> Self {
        let code = match err.source {
            DirectiveError::UnknownPath { .. } | DirectiveError::UnknownColumn { .. } => {
                ErrorCode::UnknownPath
            }
            DirectiveError::UnsupportedRelation { .. } | DirectiveError::Unsupported(_) => {
                ErrorCode::UnsupportedDirective
            }
        };
        Self::new(code, err.to_string())
            .with_context("Applying load plan")
            .with_path(err.path.to_string())
            .with_help("The query cannot honor this directive; loading is not relaxed in its place")
            .with_source(err)
    }
}

impl From<SchemaError> for SelectError {
    fn from(err: SchemaError) -> Self {
        let code = match &err {
            SchemaError::ConfigError { .. } | SchemaError::TomlError { .. } => {
                ErrorCode::InvalidConfiguration
            }
            _ => ErrorCode::InvalidDefinition,
        };
        Self::new(code, err.to_string()).with_source(err)
    }
}

/// A directive a query collaborator cannot honor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    /// The relation's configuration cannot be loaded the requested way.
    #[error("relation '{relation}' is not supported: {reason}")]
    UnsupportedRelation { relation: String, reason: String },

    /// The path does not exist relative to the query's root.
    #[error("unknown relation path '{path}'")]
    UnknownPath { path: String },

    /// A projected column does not exist on the model at the path.
    #[error("model '{model}' has no column '{column}'")]
    UnknownColumn { model: String, column: String },

    /// Any other limitation of the collaborator.
    #[error("{0}")]
    Unsupported(String),
}

/// A plan directive failed to apply.
///
/// Carries the relation path and the directive that failed so a caller can
/// tell which part of the schema the query could not express.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot apply `{directive}` at '{path}': {source}")]
pub struct PlanApplicationError {
    /// Relation path the directive targeted.
    pub path: RelationPath,
    /// The failing directive.
    pub directive: Directive,
    /// Why the collaborator refused it.
    #[source]
    pub source: DirectiveError,
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! select_error {
    ($code:expr, $msg:expr) => {
        $crate::error::SelectError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::SelectError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapeload_schema::{Cardinality, RelationLoadStrategy};

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::UnknownSchema.code(), "S1001");
        assert_eq!(ErrorCode::UnsupportedDirective.code(), "S2001");
        assert_eq!(ErrorCode::UnplannedLoad.code(), "S3001");
        assert_eq!(ErrorCode::Internal.to_string(), "S9001");
    }

    #[test]
    fn test_code_families() {
        assert!(ErrorCode::InvalidBinding.is_resolution());
        assert!(!ErrorCode::InvalidBinding.is_application());
        assert!(ErrorCode::UnknownPath.is_application());
        assert!(!ErrorCode::UnplannedLoad.is_resolution());
    }

    #[test]
    fn test_from_resolution_error() {
        let err: SelectError = ResolutionError::UnresolvedReference {
            schema: "UserSchema".into(),
            field: "images".into(),
            reference: "ImageSchema".into(),
        }
        .into();

        assert!(err.is_resolution_error());
        assert_eq!(err.code, ErrorCode::UnresolvedReference);
        assert_eq!(err.context.schema.as_deref(), Some("UserSchema"));
        assert_eq!(err.context.field.as_deref(), Some("images"));
        assert!(err.message.contains("ImageSchema"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_undetermined_cardinality_suggests_fix() {
        let err: SelectError = ResolutionError::UndeterminedCardinality {
            schema: "PostSchema".into(),
            field: "related".into(),
        }
        .into();
        assert_eq!(err.context.suggestions.len(), 1);
    }

    #[test]
    fn test_from_plan_application_error() {
        let err = PlanApplicationError {
            path: RelationPath::from_segments(["likes", "user"]),
            directive: Directive::EagerLoad {
                cardinality: Cardinality::One,
                strategy: RelationLoadStrategy::Join,
            },
            source: DirectiveError::UnsupportedRelation {
                relation: "user".into(),
                reason: "composite identity".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "cannot apply `eager_load(one, join)` at 'likes.user': relation 'user' is not supported: composite identity"
        );

        let select: SelectError = err.into();
        assert!(select.is_application_error());
        assert_eq!(select.code, ErrorCode::UnsupportedDirective);
        assert_eq!(select.context.path.as_deref(), Some("likes.user"));
    }

    #[test]
    fn test_unplanned_load() {
        let err = SelectError::unplanned_load("User", "images");
        assert!(err.is_unplanned_load());
        assert_eq!(err.context.model.as_deref(), Some("User"));
        assert!(err.message.contains("User.images"));
    }

    #[test]
    fn test_display_full() {
        let err = SelectError::unplanned_load("Image", "likes").with_path("default_image");

        let output = err.display_full();
        assert!(output.contains("S3001"));
        assert!(output.contains("Path: default_image"));
        assert!(output.contains("Suggestions"));
        assert!(output.contains("Help:"));
    }

    #[test]
    fn test_error_macro() {
        let err = select_error!(
            ErrorCode::InvalidConfiguration,
            "unknown strategy",
            with_field = "many_strategy",
            with_suggestion = "Use `separate` or `join`"
        );

        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
        assert_eq!(err.context.field, Some("many_strategy".to_string()));
    }

    #[test]
    fn test_suggestion_with_code() {
        let err = SelectError::execution("boom")
            .with_code_suggestion("Filter the root query", "store.query(\"User\")?.filter_eq(\"id\", 1)");

        let suggestion = err.context.suggestions.last().unwrap();
        assert!(suggestion.code.is_some());
    }
}
