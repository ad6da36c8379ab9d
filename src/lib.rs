//! # Shapeload
//!
//! Schema-driven load planning.
//!
//! An output schema already says which fields and relations a serializer
//! will read. Shapeload turns that description into a load plan and applies
//! it to a query, so the query fetches exactly that shape in a bounded number
//! of round trips, and anything outside it fails loudly instead of loading
//! lazily one row at a time.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shapeload::prelude::*;
//!
//! let registry = SchemaRegistry::from_source(r#"
//!     model User {
//!         id     Int     @id
//!         name   String
//!         images Image[]
//!     }
//!     model Image {
//!         id      Int    @id
//!         url     String
//!         user_id Int    @foreign
//!         user    User
//!     }
//!     schema UserSchema for User {
//!         images: [ImageSchema]
//!     }
//!     schema ImageSchema for Image {
//!         user: UserSchema
//!     }
//! "#)?;
//!
//! let resolver = Resolver::new(registry.clone());
//! let filter = SchemaFilter::new(&resolver, "UserSchema", true)?;
//!
//! let store = MemoryStore::new(registry);
//! let query = filter.apply(store.query("User")?)?;
//! let mut session = store.session();
//! let users = query.execute(&mut session)?;
//! ```
//!
//! ## Crates
//!
//! - [`schema`]: models, output schemas, the `.shape` parser, configuration
//!   and the schema graph resolver
//! - [`query`]: load plans, plan application and the in-memory store

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Schema definitions, parsing and resolution.
pub mod schema {
    pub use shapeload_schema::*;
}

/// Load plans and their application.
pub mod query {
    pub use shapeload_query::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use shapeload_query::prelude::*;
    pub use shapeload_schema::{SchemaError, ShapeloadConfig};
}

// Re-export key types at the crate root
pub use shapeload_query::{SchemaFilter, SelectError, SelectResult};
pub use shapeload_schema::{ResolutionError, SchemaError, SchemaRegistry};
