//! Load plans: which columns and relations to fetch, at which paths.

mod builder;
mod cache;
mod node;
mod path;

pub use builder::PlanBuilder;
pub use cache::{CacheStats, PlanCache};
pub use node::PlanNode;
pub use path::RelationPath;
