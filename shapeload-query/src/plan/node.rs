//! The load plan tree.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::RelationPath;
use shapeload_schema::{Cardinality, SchemaKey};

/// One node of a load plan: what to load for the entities reached at one
/// relation path.
///
/// The root node has no cardinality. Children are keyed by model relation
/// name and kept in schema declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanNode {
    /// Model of the entities at this path.
    pub model: SmolStr,
    /// Schema instance this node was built from.
    pub schema: SchemaKey,
    /// Cardinality of the relation leading here; `None` at the root.
    pub cardinality: Option<Cardinality>,
    /// Columns to load, always including the model identity.
    pub projected_columns: Vec<SmolStr>,
    /// Relations to materialize, by relation name.
    pub children: IndexMap<SmolStr, PlanNode>,
    /// Whether expansion stopped here because the schema was already being
    /// expanded on the current path.
    pub terminal: bool,
}

impl PlanNode {
    /// Create a node with no children.
    pub fn new(
        model: impl Into<SmolStr>,
        schema: SchemaKey,
        cardinality: Option<Cardinality>,
        projected_columns: Vec<SmolStr>,
    ) -> Self {
        Self {
            model: model.into(),
            schema,
            cardinality,
            projected_columns,
            children: IndexMap::new(),
            terminal: false,
        }
    }

    /// Check whether this node was cut at a cycle boundary.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Check whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of relation hops below this node; a leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.children
            .values()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Every relation path below this node, parents before children.
    pub fn relation_paths(&self) -> Vec<RelationPath> {
        let mut paths = Vec::new();
        self.collect_paths(&RelationPath::root(), &mut paths);
        paths
    }

    fn collect_paths(&self, prefix: &RelationPath, out: &mut Vec<RelationPath>) {
        for (relation, child) in &self.children {
            let path = prefix.child(relation.clone());
            out.push(path.clone());
            child.collect_paths(&path, out);
        }
    }

    /// Look up the node at a path relative to this one.
    pub fn get(&self, path: &RelationPath) -> Option<&PlanNode> {
        let mut node = self;
        for segment in path.segments() {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    /// Visit every node with its path, parents before children.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&RelationPath, &'a PlanNode)) {
        self.walk_from(&RelationPath::root(), f);
    }

    fn walk_from<'a>(&'a self, path: &RelationPath, f: &mut impl FnMut(&RelationPath, &'a PlanNode)) {
        f(path, self);
        for (relation, child) in &self.children {
            child.walk_from(&path.child(relation.clone()), f);
        }
    }

    /// Merge another node for the same relation into this one.
    ///
    /// Columns are unioned in first-appearance order and children merged
    /// recursively. The result is terminal only if both sides were. The schema
    /// key and cardinality of `self` are kept; the builder rejects fields that
    /// disagree on cardinality before merging.
    pub(crate) fn merge(&mut self, other: PlanNode) {
        for column in other.projected_columns {
            if !self.projected_columns.contains(&column) {
                self.projected_columns.push(column);
            }
        }
        for (relation, child) in other.children {
            match self.children.get_mut(&relation) {
                Some(existing) => existing.merge(child),
                None => {
                    self.children.insert(relation, child);
                }
            }
        }
        self.terminal = self.terminal && other.terminal;
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, label: Option<&str>, indent: usize) -> fmt::Result {
        write!(f, "{:width$}", "", width = indent * 2)?;
        if let Some(label) = label {
            write!(f, "{}: ", label)?;
            if let Some(cardinality) = self.cardinality {
                write!(f, "{} ", cardinality)?;
            }
        }
        write!(f, "{}({})", self.model, self.projected_columns.join(", "))?;
        if self.terminal {
            f.write_str(" [terminal]")?;
        }
        writeln!(f)?;
        for (relation, child) in &self.children {
            child.fmt_tree(f, Some(relation), indent + 1)?;
        }
        Ok(())
    }
}

/// Renders the plan as an indented tree, one node per line:
///
/// ```text
/// User(id, first_name)
///   default_image: one Image(id, url)
///     user: one User(id, first_name) [terminal]
/// ```
impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, None, 0)
    }
}
