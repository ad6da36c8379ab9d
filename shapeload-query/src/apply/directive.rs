//! Load directives installed on a query.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use shapeload_schema::{Cardinality, RelationLoadStrategy, UnplannedAccess};

/// One instruction the applier gives a query at a relation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// Restrict loaded columns.
    LoadOnly {
        /// Columns to load, identity included.
        columns: Vec<SmolStr>,
    },
    /// Materialize the relation ending the path up front.
    EagerLoad {
        /// Cardinality of the relation.
        cardinality: Cardinality,
        /// How it is materialized.
        strategy: RelationLoadStrategy,
    },
    /// Forbid loads not installed by the plan.
    ForbidUnplanned {
        /// What an unplanned access does.
        policy: UnplannedAccess,
    },
}

impl Directive {
    /// Directive name as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadOnly { .. } => "load_only",
            Self::EagerLoad { .. } => "eager_load",
            Self::ForbidUnplanned { .. } => "forbid_unplanned",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadOnly { columns } => write!(f, "load_only({})", columns.join(", ")),
            Self::EagerLoad {
                cardinality,
                strategy,
            } => write!(f, "eager_load({}, {})", cardinality, strategy),
            Self::ForbidUnplanned { policy } => write!(f, "forbid_unplanned({})", policy),
        }
    }
}
