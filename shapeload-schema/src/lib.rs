//! # shapeload-schema
//!
//! Schema and model metadata for Shapeload.
//!
//! This crate provides:
//! - Model metadata (columns, identity, relations and how they join)
//! - Output schema definitions with nesting, inheritance and field filters
//! - A definition language parser for `.shape` files
//! - An immutable, validated [`SchemaRegistry`]
//! - The schema graph [`Resolver`], turning schema instances into [`SchemaNode`]s
//! - Configuration parsing for `shapeload.toml`
//!
//! ## Example
//!
//! ```rust,ignore
//! use shapeload_schema::{Resolver, SchemaKey, SchemaRegistry, ShapeloadConfig};
//!
//! let registry = SchemaRegistry::from_source(r#"
//!     model User {
//!         id     Int    @id
//!         email  String
//!         images Image[]
//!     }
//!     model Image {
//!         id      Int    @id
//!         url     String
//!         user_id Int    @foreign
//!     }
//!     schema UserSchema for User {
//!         images: [ImageSchema]
//!     }
//!     schema ImageSchema for Image {}
//! "#)?;
//!
//! let resolver = Resolver::new(registry);
//! let node = resolver.resolve(&SchemaKey::new("UserSchema"))?;
//!
//! let config = ShapeloadConfig::from_file("shapeload.toml")?;
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod parser;
pub mod registry;
pub mod resolve;
pub mod validator;

pub use ast::*;
pub use config::{
    PlannerConfig, ProjectionPolicy, RelationLoadStrategy, ShapeloadConfig, UnplannedAccess,
};
pub use error::{ResolutionError, ResolveResult, SchemaError, SchemaResult};
pub use parser::{parse_document, parse_document_file};
pub use registry::{RegistryBuilder, SchemaRegistry};
pub use resolve::{RelationSpec, Resolver, ScalarField, SchemaKey, SchemaNode};
pub use validator::{Validator, validate_document};
