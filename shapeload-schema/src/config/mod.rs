//! Configuration file parsing for `shapeload.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::ast::Cardinality;
use crate::error::{SchemaError, SchemaResult};
use crate::registry::SchemaRegistry;

/// Main configuration structure for `shapeload.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ShapeloadConfig {
    /// Definition file configuration.
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Planner settings.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl ShapeloadConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })
    }

    /// Apply environment-specific overrides.
    ///
    /// Unknown environment names leave the configuration unchanged.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(path) = overrides.schema.and_then(|s| s.path) {
                self.schema.path = path;
            }
            if let Some(planner) = overrides.planner {
                if let Some(enforce) = planner.enforce {
                    self.planner.enforce = enforce;
                }
                if let Some(unplanned) = planner.unplanned {
                    self.planner.unplanned = unplanned;
                }
                if let Some(strategy) = planner.single_strategy {
                    self.planner.single_strategy = strategy;
                }
                if let Some(strategy) = planner.many_strategy {
                    self.planner.many_strategy = strategy;
                }
                if let Some(projection) = planner.projection {
                    self.planner.projection = projection;
                }
            }
            if let Some(log_plans) = overrides.debug.and_then(|d| d.log_plans) {
                self.debug.log_plans = log_plans;
            }
        }
        self
    }

    /// Load the definition file named by `[schema] path`, relative to `root`.
    pub fn load_registry(&self, root: impl AsRef<Path>) -> SchemaResult<Arc<SchemaRegistry>> {
        let path = root.as_ref().join(&self.schema.path);
        SchemaRegistry::from_file(path)
    }
}

/// Definition file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// Path to the `.shape` file.
    #[serde(default = "default_schema_path")]
    pub path: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            path: default_schema_path(),
        }
    }
}

fn default_schema_path() -> String {
    "schema.shape".to_string()
}

/// How a relation is materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationLoadStrategy {
    /// One batched select-in round trip per relation path.
    #[default]
    Separate,
    /// Materialized inside the parent's round trip.
    Join,
}

impl RelationLoadStrategy {
    /// Check if this strategy costs its own round trip.
    pub fn is_separate(&self) -> bool {
        matches!(self, Self::Separate)
    }

    /// Get the strategy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Separate => "separate",
            Self::Join => "join",
        }
    }
}

impl std::fmt::Display for RelationLoadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when code touches a relation the plan did not load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnplannedAccess {
    /// The access is rejected with an error.
    #[default]
    Raise,
    /// The access yields nothing, without a round trip.
    #[serde(alias = "no_load")]
    Noload,
}

impl std::fmt::Display for UnplannedAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raise => f.write_str("raise"),
            Self::Noload => f.write_str("noload"),
        }
    }
}

/// Column projection when one model is reached at several paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionPolicy {
    /// Every path loading a model projects the union of the columns requested
    /// for that model anywhere in the plan.
    #[default]
    #[serde(alias = "union_by_model")]
    Union,
    /// Each path projects exactly what its own schema asks for.
    PerPath,
}

/// Planner settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerConfig {
    /// Forbid loads the plan did not install.
    #[serde(default = "default_true")]
    pub enforce: bool,

    /// Behavior of forbidden loads when enforcing.
    #[serde(default)]
    pub unplanned: UnplannedAccess,

    /// Strategy for single-cardinality relations.
    #[serde(default)]
    pub single_strategy: RelationLoadStrategy,

    /// Strategy for many-cardinality relations.
    #[serde(default)]
    pub many_strategy: RelationLoadStrategy,

    /// Projection policy.
    #[serde(default)]
    pub projection: ProjectionPolicy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enforce: true,
            unplanned: UnplannedAccess::default(),
            single_strategy: RelationLoadStrategy::default(),
            many_strategy: RelationLoadStrategy::default(),
            projection: ProjectionPolicy::default(),
        }
    }
}

impl PlannerConfig {
    /// The load strategy for a cardinality.
    pub fn strategy_for(&self, cardinality: Cardinality) -> RelationLoadStrategy {
        match cardinality {
            Cardinality::One => self.single_strategy,
            Cardinality::Many => self.many_strategy,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Debug/logging configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log every built plan as a tree at debug level.
    #[serde(default)]
    pub log_plans: bool,
}

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Definition file overrides.
    pub schema: Option<SchemaOverride>,

    /// Planner overrides.
    pub planner: Option<PlannerOverride>,

    /// Debug overrides.
    pub debug: Option<DebugOverride>,
}

/// Definition file overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaOverride {
    /// Override the definition path.
    pub path: Option<String>,
}

/// Planner overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerOverride {
    /// Override `enforce`.
    pub enforce: Option<bool>,
    /// Override `unplanned`.
    pub unplanned: Option<UnplannedAccess>,
    /// Override `single_strategy`.
    pub single_strategy: Option<RelationLoadStrategy>,
    /// Override `many_strategy`.
    pub many_strategy: Option<RelationLoadStrategy>,
    /// Override `projection`.
    pub projection: Option<ProjectionPolicy>,
}

/// Debug configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugOverride {
    /// Override `log_plans`.
    pub log_plans: Option<bool>,
}

/// Expand environment variables in the format `${VAR_NAME}`.
///
/// Unset variables are left as written.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
