//! Abstract Syntax Tree (AST) types for Shapeload definitions.
//!
//! Models describe what storage holds; schemas describe what a serializer emits.

mod attribute;
mod document;
mod model;
mod schema;
mod types;

pub use attribute::*;
pub use document::*;
pub use model::*;
pub use schema::*;
pub use types::*;
