//! The public entry point: a schema-derived query filter.
//!
//! Constructing a [`SchemaFilter`] builds the plan for a schema instance;
//! applying it rewrites a query so that executing it loads exactly what the
//! schema will read.
//!
//! ```rust,ignore
//! use shapeload_query::prelude::*;
//!
//! let resolver = Resolver::new(registry);
//! let filter = SchemaFilter::new(&resolver, "UserDetailSchema", true)?;
//!
//! let query = filter.apply(store.query("User")?.filter_eq("id", 1))?;
//! let users = query.execute(&mut session)?;
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::apply::{LoadQuery, PlanApplier};
use crate::error::PlanApplicationError;
use crate::plan::{PlanBuilder, PlanCache, PlanNode};
use shapeload_schema::{PlannerConfig, ResolveResult, Resolver, SchemaKey, ShapeloadConfig};

/// A load plan bound to the settings it is applied with.
///
/// Cheap to clone; the plan itself is shared.
#[derive(Debug, Clone)]
pub struct SchemaFilter {
    key: SchemaKey,
    plan: Arc<PlanNode>,
    applier: PlanApplier,
}

impl SchemaFilter {
    /// Build a filter with default planner settings and the given enforcement.
    pub fn new(resolver: &Resolver, key: impl Into<SchemaKey>, enforce: bool) -> ResolveResult<Self> {
        let config = PlannerConfig {
            enforce,
            ..PlannerConfig::default()
        };
        Self::with_config(resolver, key, &config)
    }

    /// Build a filter from planner settings.
    pub fn with_config(
        resolver: &Resolver,
        key: impl Into<SchemaKey>,
        config: &PlannerConfig,
    ) -> ResolveResult<Self> {
        let key = key.into();
        let plan = PlanBuilder::new(resolver)
            .projection(config.projection)
            .build(&key)?;
        Ok(Self::from_plan(key, Arc::new(plan), config))
    }

    /// Build a filter from a loaded configuration file.
    ///
    /// With `debug.log_plans` set the plan is logged as a tree.
    pub fn from_config(
        resolver: &Resolver,
        key: impl Into<SchemaKey>,
        config: &ShapeloadConfig,
    ) -> ResolveResult<Self> {
        let filter = Self::with_config(resolver, key, &config.planner)?;
        if config.debug.log_plans {
            debug!(schema = %filter.key, plan = %filter.plan, "Load plan");
        }
        Ok(filter)
    }

    /// Build a filter, reusing a plan from `cache` when one exists.
    ///
    /// The cache must only ever be used with one projection policy.
    pub fn cached(
        resolver: &Resolver,
        cache: &PlanCache,
        key: impl Into<SchemaKey>,
        config: &PlannerConfig,
    ) -> ResolveResult<Self> {
        let key = key.into();
        let builder = PlanBuilder::new(resolver).projection(config.projection);
        let plan = cache.get_or_build(&builder, &key)?;
        Ok(Self::from_plan(key, plan, config))
    }

    fn from_plan(key: SchemaKey, plan: Arc<PlanNode>, config: &PlannerConfig) -> Self {
        Self {
            key,
            plan,
            applier: PlanApplier::new(config.clone()),
        }
    }

    /// The schema instance the plan was built from.
    pub fn key(&self) -> &SchemaKey {
        &self.key
    }

    /// The load plan.
    pub fn plan(&self) -> &PlanNode {
        &self.plan
    }

    /// The planner settings directives are issued with.
    pub fn config(&self) -> &PlannerConfig {
        self.applier.config()
    }

    /// Rewrite `query` so it loads the planned shape.
    pub fn apply<Q: LoadQuery>(&self, query: Q) -> Result<Q, PlanApplicationError> {
        self.applier.apply(&self.plan, query)
    }

    /// Rewrite `query` in place.
    pub fn apply_to<Q: LoadQuery + ?Sized>(&self, query: &mut Q) -> Result<(), PlanApplicationError> {
        self.applier.apply_to(&self.plan, query)
    }
}
