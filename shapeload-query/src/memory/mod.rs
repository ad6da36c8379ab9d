//! An in-memory store that executes load directives.
//!
//! [`MemoryStore`] holds rows per model and counts round trips: every request
//! that a real database would have to serve. [`MemoryQuery`] implements
//! [`LoadQuery`](crate::apply::LoadQuery), so a load plan can be applied to it
//! and executed into a [`Session`], whose identity map tracks which columns
//! and relations of each entity are loaded and what happens on access to
//! anything else.
//!
//! ```rust,ignore
//! let store = MemoryStore::new(registry);
//! store.insert("User", json!({"id": 1, "name": "u"}))?;
//!
//! let mut session = store.session();
//! let query = filter.apply(store.query("User")?)?;
//! let users = query.execute(&mut session)?;
//! assert_eq!(store.round_trips(), 1);
//! ```

mod query;
mod session;
mod store;

pub use query::{MemoryQuery, PathOptions};
pub use session::{EntityState, Session};
pub use store::{EntityRef, MemoryStore, Row};
