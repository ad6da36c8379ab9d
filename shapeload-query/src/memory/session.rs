//! Identity map and attribute access.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use smol_str::SmolStr;
use tracing::trace;

use super::store::{MemoryStore, Row};
use super::EntityRef;
use crate::error::{SelectError, SelectResult};
use shapeload_schema::UnplannedAccess;

/// What the session knows about one entity.
#[derive(Debug, Clone)]
pub struct EntityState {
    row: Row,
    /// Loaded columns; `None` when the whole row was loaded.
    loaded: Option<HashSet<SmolStr>>,
    relations: HashMap<SmolStr, Vec<EntityRef>>,
    policy: Option<UnplannedAccess>,
}

impl EntityState {
    /// Check whether a column is loaded.
    pub fn is_loaded(&self, column: &str) -> bool {
        self.loaded.as_ref().is_none_or(|cols| cols.contains(column))
    }

    /// Check whether a relation is materialized.
    pub fn has_relation(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    /// The unplanned-access policy installed for this entity, if any.
    pub fn policy(&self) -> Option<UnplannedAccess> {
        self.policy
    }

    fn has_columns(&self, columns: Option<&[SmolStr]>) -> bool {
        match (&self.loaded, columns) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(loaded), Some(columns)) => columns.iter().all(|c| loaded.contains(c)),
        }
    }
}

/// A unit of work over a [`MemoryStore`].
///
/// Holds an identity map: each stored entity is represented at most once,
/// whichever query or relation loaded it. Attribute access goes through the
/// session, which serves loaded data for free and either lazily loads, yields
/// nothing, or rejects the access for everything else, depending on the
/// policy the load plan installed.
#[derive(Debug)]
pub struct Session {
    store: Arc<MemoryStore>,
    entities: HashMap<EntityRef, EntityState>,
}

impl Session {
    pub(crate) fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            entities: HashMap::new(),
        }
    }

    /// The store this session reads.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Look up an entity by identity, consulting the identity map first.
    ///
    /// A hit costs nothing; a miss costs one round trip.
    pub fn get(&mut self, model: &str, id: impl Into<Value>) -> SelectResult<Option<EntityRef>> {
        let def = self.store.model(model)?;
        let entity = EntityRef::new(def.name.clone(), &id.into());
        if self.entities.contains_key(&entity) {
            trace!(entity = %entity, "Identity map hit");
            return Ok(Some(entity));
        }

        self.store.round_trip(&format_args!("get {}", entity));
        match self.store.row(&entity) {
            Some(row) => {
                self.merge_lazy(&entity, row);
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Read a column.
    pub fn column(&mut self, entity: &EntityRef, column: &str) -> SelectResult<Value> {
        let def = self.store.model(&entity.model)?;
        if def.get_column(column).is_none() {
            return Err(SelectError::execution(format!(
                "model '{}' has no column '{}'",
                entity.model, column
            ))
            .with_model(entity.model.as_str()));
        }

        let state = self.state_of(entity)?;
        if state.is_loaded(column) {
            return Ok(state.row.get(column).cloned().unwrap_or(Value::Null));
        }
        match state.policy {
            Some(UnplannedAccess::Raise) => Err(SelectError::unplanned_load(entity.model.as_str(), column)),
            Some(UnplannedAccess::Noload) => Ok(Value::Null),
            None => {
                self.store
                    .round_trip(&format_args!("lazy column {}.{}", entity, column));
                let row = self.store.row(entity).ok_or_else(|| {
                    SelectError::not_found(entity.model.as_str(), &entity.id)
                })?;
                let value = row.get(column).cloned().unwrap_or(Value::Null);
                if let Some(state) = self.entities.get_mut(entity) {
                    if let Some(loaded) = state.loaded.as_mut() {
                        loaded.insert(SmolStr::new(column));
                    }
                    state.row = row;
                }
                Ok(value)
            }
        }
    }

    /// Read a relation as a list of related entities.
    pub fn related(&mut self, entity: &EntityRef, relation: &str) -> SelectResult<Vec<EntityRef>> {
        let owner = self.store.model(&entity.model)?;
        let Some(def) = owner.get_relation(relation) else {
            return Err(SelectError::execution(format!(
                "model '{}' has no relation '{}'",
                entity.model, relation
            ))
            .with_model(entity.model.as_str()));
        };

        let state = self.state_of(entity)?;
        if let Some(loaded) = state.relations.get(relation) {
            return Ok(loaded.clone());
        }
        match state.policy {
            Some(UnplannedAccess::Raise) => {
                return Err(SelectError::unplanned_load(entity.model.as_str(), relation));
            }
            Some(UnplannedAccess::Noload) => return Ok(Vec::new()),
            None => {}
        }

        let parents = vec![(entity.clone(), state.row.clone())];
        // A many-to-one whose target is already in the identity map is served
        // from it.
        let cached = MemoryStore::foreign_targets(def, &parents)
            .is_some_and(|targets| targets.iter().all(|t| self.entities.contains_key(t)));
        if !cached {
            self.store
                .round_trip(&format_args!("lazy relation {}.{}", entity, relation));
        }

        let related = self.store.fetch_related(owner, def, &parents)?;
        for (target, row) in related.targets {
            self.merge_lazy(&target, row);
        }
        let linked = related
            .links
            .into_iter()
            .next()
            .map(|(_, linked)| linked)
            .unwrap_or_default();
        self.set_relation(entity, relation, linked.clone());
        Ok(linked)
    }

    /// Read a single-valued relation.
    pub fn related_one(&mut self, entity: &EntityRef, relation: &str) -> SelectResult<Option<EntityRef>> {
        Ok(self.related(entity, relation)?.into_iter().next())
    }

    /// State of an entity in the identity map.
    pub fn state(&self, entity: &EntityRef) -> Option<&EntityState> {
        self.entities.get(entity)
    }

    /// Check whether an entity is in the identity map.
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of entities in the identity map.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the identity map is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Forget every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    fn state_of(&self, entity: &EntityRef) -> SelectResult<&EntityState> {
        self.entities.get(entity).ok_or_else(|| {
            SelectError::internal(format!("{} is not in this session", entity))
        })
    }

    pub(crate) fn row(&self, entity: &EntityRef) -> Option<&Row> {
        self.entities.get(entity).map(|s| &s.row)
    }

    /// Check whether an entity is present with at least `columns` loaded
    /// (`None` meaning every column).
    pub(crate) fn has_columns(&self, entity: &EntityRef, columns: Option<&[SmolStr]>) -> bool {
        self.entities
            .get(entity)
            .is_some_and(|state| state.has_columns(columns))
    }

    /// Merge a row fetched by a query execution.
    ///
    /// The policy of the most recent query wins: an entity first loaded under
    /// `Raise` and then reached by an unenforced query loads lazily again.
    /// Columns are only ever widened and materialized relations are kept.
    pub(crate) fn merge(
        &mut self,
        entity: &EntityRef,
        row: Row,
        columns: Option<&[SmolStr]>,
        policy: Option<UnplannedAccess>,
    ) {
        self.upsert(entity, row, columns).policy = policy;
    }

    /// Merge a row fetched by a lazy load. An entity already present keeps
    /// its policy.
    fn merge_lazy(&mut self, entity: &EntityRef, row: Row) {
        self.upsert(entity, row, None);
    }

    fn upsert(&mut self, entity: &EntityRef, row: Row, columns: Option<&[SmolStr]>) -> &mut EntityState {
        let loaded = columns.map(|cols| cols.iter().cloned().collect::<HashSet<_>>());
        let state = self.entities.entry(entity.clone()).or_insert_with(|| EntityState {
            row: Row::new(),
            loaded: Some(HashSet::new()),
            relations: HashMap::new(),
            policy: None,
        });
        match loaded {
            Some(new) => {
                if let Some(existing) = state.loaded.as_mut() {
                    existing.extend(new);
                }
            }
            None => state.loaded = None,
        }
        state.row = row;
        state
    }

    pub(crate) fn set_relation(&mut self, entity: &EntityRef, relation: &str, targets: Vec<EntityRef>) {
        if let Some(state) = self.entities.get_mut(entity) {
            state.relations.insert(SmolStr::new(relation), targets);
        }
    }
}
