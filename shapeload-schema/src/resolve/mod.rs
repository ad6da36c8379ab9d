//! Schema graph resolution.
//!
//! Given a root schema instance, the resolver produces a normalized
//! [`SchemaNode`] for every schema reachable by nesting: which scalar fields it
//! reads and which relations it follows, each with a cardinality and a target.
//!
//! ```rust,ignore
//! use shapeload_schema::{Resolver, SchemaKey, SchemaRegistry};
//!
//! let registry = SchemaRegistry::from_file("gallery.shape")?;
//! let resolver = Resolver::new(registry);
//! let user = resolver.resolve(&SchemaKey::new("UserSchema").exclude(["email"]))?;
//! for spec in user.relation_fields.values() {
//!     let target = resolver.target(spec)?;
//!     println!("{} -> {} ({})", spec.field, target.key, spec.cardinality);
//! }
//! ```

mod effective;
mod key;
mod node;
mod resolver;

pub use effective::bound_model;
pub use key::SchemaKey;
pub use node::{RelationSpec, ScalarField, SchemaNode};
pub use resolver::Resolver;
