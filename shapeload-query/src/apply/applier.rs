//! Installs a load plan on a query.

use tracing::{debug, trace};

use super::{Directive, LoadQuery};
use crate::error::{DirectiveError, PlanApplicationError};
use crate::plan::{PlanNode, RelationPath};
use shapeload_schema::PlannerConfig;

/// Walks a plan and issues its directives to a [`LoadQuery`].
///
/// At the root: restrict columns, then forbid unplanned loads when enforcing.
/// For each child, in declaration order: request it eagerly with the
/// strategy configured for its cardinality, forbid unplanned loads, restrict
/// columns, then recurse relative to the child's path.
#[derive(Debug, Clone, Default)]
pub struct PlanApplier {
    config: PlannerConfig,
}

impl PlanApplier {
    /// Create an applier from planner settings.
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Create an applier that only installs projection and eager directives.
    pub fn without_enforcement() -> Self {
        Self::new(PlannerConfig {
            enforce: false,
            ..PlannerConfig::default()
        })
    }

    /// The planner settings in use.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Install `plan` on `query` and return the rewritten query.
    pub fn apply<Q: LoadQuery>(&self, plan: &PlanNode, mut query: Q) -> Result<Q, PlanApplicationError> {
        self.apply_to(plan, &mut query)?;
        Ok(query)
    }

    /// Install `plan` on a query in place.
    ///
    /// On error the query may hold the directives issued before the failing
    /// one and must not be executed.
    pub fn apply_to<Q: LoadQuery + ?Sized>(
        &self,
        plan: &PlanNode,
        query: &mut Q,
    ) -> Result<(), PlanApplicationError> {
        let root = RelationPath::root();
        self.load_only(query, &root, plan)?;
        self.forbid(query, &root)?;
        self.apply_children(query, &root, plan)?;

        debug!(
            model = %plan.model,
            schema = %plan.schema,
            paths = plan.relation_paths().len(),
            enforce = self.config.enforce,
            "Applied load plan"
        );
        Ok(())
    }

    fn apply_children<Q: LoadQuery + ?Sized>(
        &self,
        query: &mut Q,
        parent: &RelationPath,
        node: &PlanNode,
    ) -> Result<(), PlanApplicationError> {
        for (relation, child) in &node.children {
            let path = parent.child(relation.clone());
            let Some(cardinality) = child.cardinality else {
                return Err(PlanApplicationError {
                    directive: Directive::LoadOnly {
                        columns: child.projected_columns.clone(),
                    },
                    source: DirectiveError::Unsupported(format!(
                        "plan node '{}' has no cardinality",
                        path
                    )),
                    path,
                });
            };

            let strategy = self.config.strategy_for(cardinality);
            trace!(path = %path, %cardinality, %strategy, "eager_load");
            query
                .eager_load(&path, cardinality, strategy)
                .map_err(|source| PlanApplicationError {
                    path: path.clone(),
                    directive: Directive::EagerLoad {
                        cardinality,
                        strategy,
                    },
                    source,
                })?;

            self.forbid(query, &path)?;
            self.load_only(query, &path, child)?;
            self.apply_children(query, &path, child)?;
        }
        Ok(())
    }

    fn load_only<Q: LoadQuery + ?Sized>(
        &self,
        query: &mut Q,
        path: &RelationPath,
        node: &PlanNode,
    ) -> Result<(), PlanApplicationError> {
        trace!(path = %path, columns = ?node.projected_columns, "load_only");
        query
            .load_only(path, &node.projected_columns)
            .map_err(|source| PlanApplicationError {
                path: path.clone(),
                directive: Directive::LoadOnly {
                    columns: node.projected_columns.clone(),
                },
                source,
            })
    }

    fn forbid<Q: LoadQuery + ?Sized>(
        &self,
        query: &mut Q,
        path: &RelationPath,
    ) -> Result<(), PlanApplicationError> {
        if !self.config.enforce {
            return Ok(());
        }
        let policy = self.config.unplanned;
        trace!(path = %path, %policy, "forbid_unplanned");
        query
            .forbid_unplanned(path, policy)
            .map_err(|source| PlanApplicationError {
                path: path.clone(),
                directive: Directive::ForbidUnplanned { policy },
                source,
            })
    }
}
