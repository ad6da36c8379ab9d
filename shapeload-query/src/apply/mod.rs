//! Plan application: turning a load plan into directives on a query.
//!
//! The query side is abstract. Anything implementing [`LoadQuery`] can receive
//! a plan; [`crate::memory::MemoryQuery`] is the in-memory reference and
//! [`DirectiveRecorder`] simply records what it was told.

mod applier;
mod directive;
mod query;
mod recorder;

pub use applier::PlanApplier;
pub use directive::Directive;
pub use query::LoadQuery;
pub use recorder::DirectiveRecorder;
