//! # shapeload-query
//!
//! Load planning for Shapeload.
//!
//! This crate turns a resolved output schema into a load plan and applies that
//! plan to a query, so that executing the query fetches exactly the columns
//! and relations the schema will read:
//! - [`PlanBuilder`] walks the schema graph into a [`PlanNode`] tree, cutting
//!   recursion at schema instances already on the current path
//! - [`PlanCache`] shares plans between callers
//! - [`PlanApplier`] issues `load_only`, `eager_load` and `forbid_unplanned`
//!   directives to anything implementing [`LoadQuery`]
//! - [`SchemaFilter`] bundles the two for the common case
//! - [`MemoryStore`] is an in-memory backend with an identity map and a
//!   round-trip counter, for tests and examples
//!
//! ## Building a plan
//!
//! ```rust,ignore
//! use shapeload_query::prelude::*;
//!
//! let resolver = Resolver::new(registry);
//! let plan = PlanBuilder::new(&resolver).build_name("UserSchema")?;
//! println!("{plan}");
//! // User(id, name)
//! //   images: many Image(id, url)
//! ```
//!
//! ## Applying a plan
//!
//! ```rust,ignore
//! use shapeload_query::prelude::*;
//!
//! let filter = SchemaFilter::new(&resolver, "UserSchema", true)?;
//! let query = filter.apply(store.query("User")?.filter_eq("id", 1))?;
//!
//! let mut session = store.session();
//! let users = query.execute(&mut session)?;
//! // Anything the schema does not read now fails instead of loading lazily.
//! assert!(session.related(&users[0], "likes").unwrap_err().is_unplanned_load());
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use shapeload_query::{ErrorCode, SelectError};
//!
//! let err = SelectError::unplanned_load("User", "likes");
//! assert_eq!(err.code, ErrorCode::UnplannedLoad);
//! assert_eq!(err.code.code(), "S3001");
//! ```

pub mod apply;
pub mod error;
pub mod filter;
pub mod logging;
pub mod memory;
pub mod plan;

pub use apply::{Directive, DirectiveRecorder, LoadQuery, PlanApplier};
pub use error::{
    DirectiveError, ErrorCode, ErrorContext, PlanApplicationError, SelectError, SelectResult,
    Suggestion,
};
pub use filter::SchemaFilter;
pub use memory::{EntityRef, EntityState, MemoryQuery, MemoryStore, PathOptions, Row, Session};
pub use plan::{CacheStats, PlanBuilder, PlanCache, PlanNode, RelationPath};

// Re-export logging utilities
pub use logging::{
    LogFormat, init as init_logging, init_debug, init_with_level, is_debug_enabled, log_format,
    log_level,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::apply::{Directive, LoadQuery, PlanApplier};
    pub use crate::error::{PlanApplicationError, SelectError, SelectResult};
    pub use crate::filter::SchemaFilter;
    pub use crate::memory::{EntityRef, MemoryStore, Session};
    pub use crate::plan::{PlanBuilder, PlanCache, PlanNode, RelationPath};
    pub use crate::select_error;

    pub use shapeload_schema::{
        Cardinality, PlannerConfig, ProjectionPolicy, RelationLoadStrategy, ResolutionError,
        Resolver, SchemaKey, SchemaRegistry, UnplannedAccess,
    };
}
