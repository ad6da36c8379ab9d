//! In-memory tables and relation joins.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use smol_str::SmolStr;

use super::{MemoryQuery, Session};
use crate::error::{SelectError, SelectResult};
use shapeload_schema::{Join, Model, ModelRelation, SchemaRegistry};

/// A stored row: column name to value.
pub type Row = serde_json::Map<String, Value>;

/// Identity of a stored entity.
///
/// `id` is the JSON rendering of the identity value, or of the array of
/// values for a composite identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    /// Model name.
    pub model: SmolStr,
    /// Rendered identity.
    pub id: SmolStr,
}

impl EntityRef {
    /// Reference an entity by model and identity value.
    pub fn new(model: impl Into<SmolStr>, id: &Value) -> Self {
        Self {
            model: model.into(),
            id: identity_key(id),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model, self.id)
    }
}

fn identity_key(value: &Value) -> SmolStr {
    SmolStr::new(value.to_string())
}

/// The identity key of a row, if every identity column is set.
pub(crate) fn row_identity(model: &Model, row: &Row) -> Option<SmolStr> {
    let identity = model.identity();
    let mut values = Vec::with_capacity(identity.len());
    for column in &identity {
        match row.get(column.as_str()) {
            Some(Value::Null) | None => return None,
            Some(value) => values.push(value.clone()),
        }
    }
    match values.len() {
        0 => None,
        1 => values.pop().map(|v| identity_key(&v)),
        _ => Some(identity_key(&Value::Array(values))),
    }
}

fn matches_conditions(row: &Row, conditions: &IndexMap<SmolStr, Value>) -> bool {
    conditions
        .iter()
        .all(|(column, expected)| row.get(column.as_str()) == Some(expected))
}

/// Rows found for a relation, and which parent each belongs to.
#[derive(Debug, Default)]
pub(crate) struct Related {
    /// Every related row, in storage order.
    pub targets: IndexMap<EntityRef, Row>,
    /// Related entities per parent, in parent order.
    pub links: Vec<(EntityRef, Vec<EntityRef>)>,
}

/// Tables of rows for the models of a registry.
///
/// Every request that would reach a real store increments the round-trip
/// counter; reading the tables for joins does not, so callers decide what a
/// round trip is.
#[derive(Debug)]
pub struct MemoryStore {
    registry: Arc<SchemaRegistry>,
    tables: RwLock<HashMap<SmolStr, IndexMap<SmolStr, Row>>>,
    round_trips: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store for the models of `registry`.
    pub fn new(registry: Arc<SchemaRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            tables: RwLock::new(HashMap::new()),
            round_trips: AtomicU64::new(0),
        })
    }

    /// The registry whose models this store holds.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Insert or replace a row.
    ///
    /// The row must be a JSON object whose keys are columns of the model and
    /// whose identity columns are set.
    pub fn insert(&self, model: &str, row: Value) -> SelectResult<EntityRef> {
        let def = self.model(model)?;
        let Value::Object(row) = row else {
            return Err(SelectError::execution(format!("rows of '{}' must be objects", model))
                .with_model(model));
        };
        if let Some(column) = row.keys().find(|c| def.get_column(c).is_none()) {
            return Err(SelectError::execution(format!(
                "model '{}' has no column '{}'",
                model, column
            ))
            .with_model(model));
        }
        let id = row_identity(def, &row).ok_or_else(|| {
            SelectError::execution(format!("row of '{}' is missing its identity", model))
                .with_model(model)
        })?;

        let entity = EntityRef {
            model: def.name.clone(),
            id: id.clone(),
        };
        self.tables
            .write()
            .entry(def.name.clone())
            .or_default()
            .insert(id, row);
        Ok(entity)
    }

    /// Number of rows stored for a model.
    pub fn count(&self, model: &str) -> usize {
        self.tables.read().get(model).map_or(0, IndexMap::len)
    }

    /// Round trips issued so far.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// Reset the round-trip counter.
    pub fn reset_round_trips(&self) {
        self.round_trips.store(0, Ordering::SeqCst);
    }

    /// Start a query over a model.
    pub fn query(self: &Arc<Self>, model: &str) -> SelectResult<MemoryQuery> {
        self.model(model)?;
        Ok(MemoryQuery::new(Arc::clone(self), model))
    }

    /// Open a session with an empty identity map.
    pub fn session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self))
    }

    pub(crate) fn round_trip(&self, reason: &dyn fmt::Display) {
        let count = self.round_trips.fetch_add(1, Ordering::SeqCst) + 1;
        crate::shapeload_trace!(reason = %reason, count, "Round trip");
    }

    pub(crate) fn model(&self, name: &str) -> SelectResult<&Model> {
        self.registry.get_model(name).ok_or_else(|| {
            SelectError::execution(format!("unknown model '{}'", name)).with_model(name)
        })
    }

    pub(crate) fn row(&self, entity: &EntityRef) -> Option<Row> {
        self.tables
            .read()
            .get(&entity.model)
            .and_then(|table| table.get(&entity.id))
            .cloned()
    }

    pub(crate) fn scan(&self, model: &str, mut keep: impl FnMut(&Row) -> bool) -> Vec<(EntityRef, Row)> {
        let tables = self.tables.read();
        let Some(table) = tables.get(model) else {
            return Vec::new();
        };
        table
            .iter()
            .filter(|(_, row)| keep(row))
            .map(|(id, row)| {
                (
                    EntityRef {
                        model: SmolStr::new(model),
                        id: id.clone(),
                    },
                    row.clone(),
                )
            })
            .collect()
    }

    /// Targets a many-to-one relation points at, without reading them.
    ///
    /// `None` when the relation is not a foreign key on the owner.
    pub(crate) fn foreign_targets(relation: &ModelRelation, parents: &[(EntityRef, Row)]) -> Option<Vec<EntityRef>> {
        let Join::ForeignKey { local } = &relation.join else {
            return None;
        };
        Some(
            parents
                .iter()
                .filter_map(|(_, row)| match row.get(local.as_str()) {
                    Some(Value::Null) | None => None,
                    Some(value) => Some(EntityRef::new(relation.target.clone(), value)),
                })
                .collect(),
        )
    }

    /// Read the related rows of every parent in one pass over the tables.
    pub(crate) fn fetch_related(
        &self,
        owner: &Model,
        relation: &ModelRelation,
        parents: &[(EntityRef, Row)],
    ) -> SelectResult<Related> {
        let target = self.model(&relation.target)?;
        if owner.identity().len() != 1 || target.identity().len() != 1 {
            return Err(SelectError::execution(format!(
                "relation '{}.{}' joins a composite identity",
                owner.name, relation.name
            )));
        }

        let mut related = Related::default();
        let keep = |entity: EntityRef, row: Row, related: &mut Related| -> Option<EntityRef> {
            if !matches_conditions(&row, &relation.conditions) {
                return None;
            }
            related.targets.entry(entity.clone()).or_insert(row);
            Some(entity)
        };

        match &relation.join {
            Join::ForeignKey { local } => {
                for (parent, row) in parents {
                    let mut linked = Vec::new();
                    if let Some(value) = row.get(local.as_str()).filter(|v| !v.is_null()) {
                        let entity = EntityRef::new(target.name.clone(), value);
                        if let Some(target_row) = self.row(&entity) {
                            linked.extend(keep(entity, target_row, &mut related));
                        }
                    }
                    related.links.push((parent.clone(), linked));
                }
            }
            Join::Referenced { remote } => {
                let wanted: HashSet<&SmolStr> = parents.iter().map(|(p, _)| &p.id).collect();
                let mut by_parent: HashMap<SmolStr, Vec<EntityRef>> = HashMap::new();
                let rows = self.scan(&target.name, |row| {
                    row.get(remote.as_str())
                        .is_some_and(|v| wanted.contains(&identity_key(v)))
                });
                for (entity, row) in rows {
                    let parent_id = row.get(remote.as_str()).map(identity_key);
                    if let (Some(parent_id), Some(entity)) = (parent_id, keep(entity, row, &mut related)) {
                        by_parent.entry(parent_id).or_default().push(entity);
                    }
                }
                for (parent, _) in parents {
                    let linked = by_parent.get(&parent.id).cloned().unwrap_or_default();
                    related.links.push((parent.clone(), linked));
                }
            }
            Join::Through { link, local, remote } => {
                let wanted: HashSet<&SmolStr> = parents.iter().map(|(p, _)| &p.id).collect();
                let mut by_parent: HashMap<SmolStr, Vec<EntityRef>> = HashMap::new();
                let links = self.scan(link, |row| {
                    row.get(local.as_str())
                        .is_some_and(|v| wanted.contains(&identity_key(v)))
                });
                for (_, link_row) in links {
                    let (Some(owner_id), Some(target_id)) =
                        (link_row.get(local.as_str()), link_row.get(remote.as_str()))
                    else {
                        continue;
                    };
                    let entity = EntityRef::new(target.name.clone(), target_id);
                    let Some(target_row) = self.row(&entity) else {
                        continue;
                    };
                    if let Some(entity) = keep(entity, target_row, &mut related) {
                        by_parent.entry(identity_key(owner_id)).or_default().push(entity);
                    }
                }
                for (parent, _) in parents {
                    let linked = by_parent.get(&parent.id).cloned().unwrap_or_default();
                    related.links.push((parent.clone(), linked));
                }
            }
        }
        Ok(related)
    }
}
