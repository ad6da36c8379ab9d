//! Schema instance identity.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Identity of a schema instance: a registered schema plus instance-level
/// `only`/`exclude` filters.
///
/// Two references to the same schema with different filters produce different
/// output shapes, so memoization and cycle detection key on the whole value,
/// not just the name. Filter entries may be dotted paths (`likes.image`); the
/// first segment filters this schema and the remainder is pushed down to the
/// nested schema of that field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaKey {
    /// Registered schema name.
    pub name: SmolStr,
    /// Keep only these fields; `None` keeps everything.
    pub only: Option<BTreeSet<SmolStr>>,
    /// Drop these fields.
    pub exclude: BTreeSet<SmolStr>,
}

impl SchemaKey {
    /// Key for an unfiltered schema.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            only: None,
            exclude: BTreeSet::new(),
        }
    }

    /// Restrict to the given fields. Calling it again narrows further.
    pub fn only(mut self, fields: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        let fields: BTreeSet<SmolStr> = fields.into_iter().map(Into::into).collect();
        self.only = intersect(self.only, Some(fields));
        self
    }

    /// Exclude the given fields.
    pub fn exclude(mut self, fields: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Check whether any instance filter is set.
    pub fn is_filtered(&self) -> bool {
        self.only.is_some() || !self.exclude.is_empty()
    }
}

impl From<&str> for SchemaKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<SmolStr> for SchemaKey {
    fn from(name: SmolStr) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.is_filtered() {
            return Ok(());
        }
        let join = |set: &BTreeSet<SmolStr>| {
            set.iter().map(SmolStr::as_str).collect::<Vec<_>>().join(",")
        };
        let mut parts = Vec::new();
        if let Some(only) = &self.only {
            parts.push(format!("only={}", join(only)));
        }
        if !self.exclude.is_empty() {
            parts.push(format!("exclude={}", join(&self.exclude)));
        }
        write!(f, "[{}]", parts.join(" "))
    }
}

/// Split `a.b.c` into `("a", Some("b.c"))`.
pub(crate) fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// Intersect two optional restrictions; `None` means unrestricted.
pub(crate) fn intersect(
    a: Option<BTreeSet<SmolStr>>,
    b: Option<BTreeSet<SmolStr>>,
) -> Option<BTreeSet<SmolStr>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.intersection(&b).cloned().collect()),
        (a, None) => a,
        (None, b) => b,
    }
}
