//! Relation paths relative to the root entity.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use smol_str::SmolStr;

/// A sequence of relation names leading from the root entity.
///
/// The empty path is the root itself. Plans rarely nest deeper than a few
/// levels, so segments live inline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationPath(SmallVec<[SmolStr; 4]>);

impl RelationPath {
    /// The root path.
    pub fn root() -> Self {
        Self(SmallVec::new())
    }

    /// Build a path from relation names.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a dotted path such as `likes.image`. The empty string is the root.
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::root();
        }
        Self::from_segments(dotted.split('.'))
    }

    /// Extend the path by one relation.
    pub fn child(&self, relation: impl Into<SmolStr>) -> Self {
        let mut segments = self.0.clone();
        segments.push(relation.into());
        Self(segments)
    }

    /// The path without its last relation, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.iter().cloned().collect()))
    }

    /// The last relation name.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(SmolStr::as_str)
    }

    /// Check whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of relation hops from the root.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Same as [`RelationPath::is_root`].
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Relation names from the root outward.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(SmolStr::as_str)
    }
}

impl fmt::Display for RelationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl From<&str> for RelationPath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}
