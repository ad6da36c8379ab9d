//! The query collaborator contract.

use smol_str::SmolStr;

use crate::error::DirectiveError;
use crate::plan::RelationPath;
use shapeload_schema::{Cardinality, RelationLoadStrategy, UnplannedAccess};

/// A mutable query a load plan can be installed on.
///
/// Paths are relative to the query's root entity; the root path addresses the
/// root entities themselves. Directives at a nested path are only issued
/// after its parent path was requested eagerly.
///
/// Implementations report what they cannot express through [`DirectiveError`]
/// rather than falling back to unrestricted loading.
pub trait LoadQuery {
    /// Restrict the columns loaded for entities at `path`.
    fn load_only(&mut self, path: &RelationPath, columns: &[SmolStr]) -> Result<(), DirectiveError>;

    /// Materialize the relation ending `path` as part of query execution,
    /// batched across all parents rather than per row.
    fn eager_load(
        &mut self,
        path: &RelationPath,
        cardinality: Cardinality,
        strategy: RelationLoadStrategy,
    ) -> Result<(), DirectiveError>;

    /// Forbid any load not installed by the plan for entities at `path`.
    fn forbid_unplanned(
        &mut self,
        path: &RelationPath,
        policy: UnplannedAccess,
    ) -> Result<(), DirectiveError>;
}

impl<Q: LoadQuery + ?Sized> LoadQuery for &mut Q {
    fn load_only(&mut self, path: &RelationPath, columns: &[SmolStr]) -> Result<(), DirectiveError> {
        (**self).load_only(path, columns)
    }

    fn eager_load(
        &mut self,
        path: &RelationPath,
        cardinality: Cardinality,
        strategy: RelationLoadStrategy,
    ) -> Result<(), DirectiveError> {
        (**self).eager_load(path, cardinality, strategy)
    }

    fn forbid_unplanned(
        &mut self,
        path: &RelationPath,
        policy: UnplannedAccess,
    ) -> Result<(), DirectiveError> {
        (**self).forbid_unplanned(path, policy)
    }
}
