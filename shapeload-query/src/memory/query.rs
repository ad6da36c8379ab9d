//! Queries over a [`MemoryStore`].

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use smol_str::SmolStr;
use tracing::debug;

use super::store::{MemoryStore, Row};
use super::{EntityRef, Session};
use crate::apply::LoadQuery;
use crate::error::{DirectiveError, SelectError, SelectResult};
use crate::plan::RelationPath;
use shapeload_schema::{
    Cardinality, Join, Model, ModelRelation, RelationLoadStrategy, UnplannedAccess,
};

/// Directives collected for one relation path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathOptions {
    /// Restricted columns; `None` loads whole rows.
    pub columns: Option<Vec<SmolStr>>,
    /// Eager materialization, if requested.
    pub eager: Option<(Cardinality, RelationLoadStrategy)>,
    /// Policy for loads not covered by directives.
    pub policy: Option<UnplannedAccess>,
}

/// A query over one model, with equality filters on the root and load
/// directives per relation path.
///
/// Executing it costs one round trip for the root rows, plus one per
/// `Separate` relation path whose parent set is non-empty. A many-to-one path
/// whose targets are all already in the session's identity map with the
/// needed columns costs nothing. `Join` paths ride along with their parent.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    store: Arc<MemoryStore>,
    root: SmolStr,
    filters: Vec<(SmolStr, Value)>,
    paths: IndexMap<RelationPath, PathOptions>,
}

impl MemoryQuery {
    pub(crate) fn new(store: Arc<MemoryStore>, root: &str) -> Self {
        Self {
            store,
            root: SmolStr::new(root),
            filters: Vec::new(),
            paths: IndexMap::new(),
        }
    }

    /// Keep root rows whose `column` equals `value`.
    pub fn filter_eq(mut self, column: impl Into<SmolStr>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    /// The root model.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Directives collected at a path.
    pub fn options(&self, path: &RelationPath) -> Option<&PathOptions> {
        self.paths.get(path)
    }

    /// Paths requested eagerly, in request order.
    pub fn eager_paths(&self) -> Vec<&RelationPath> {
        self.paths
            .iter()
            .filter(|(_, o)| o.eager.is_some())
            .map(|(p, _)| p)
            .collect()
    }

    /// Run the query, loading results into `session`.
    pub fn execute(&self, session: &mut Session) -> SelectResult<Vec<EntityRef>> {
        if !Arc::ptr_eq(&self.store, session.store()) {
            return Err(SelectError::internal("session belongs to another store"));
        }
        let root_model = self.store.model(&self.root)?;
        if let Some((column, _)) = self
            .filters
            .iter()
            .find(|(c, _)| root_model.get_column(c).is_none())
        {
            return Err(SelectError::execution(format!(
                "model '{}' has no column '{}'",
                self.root, column
            ))
            .with_model(self.root.as_str()));
        }

        let root_path = RelationPath::root();
        let root_options = self.paths.get(&root_path).cloned().unwrap_or_default();

        self.store.round_trip(&format_args!("select {}", self.root));
        let rows = self.store.scan(&self.root, |row| {
            self.filters
                .iter()
                .all(|(column, value)| row.get(column.as_str()) == Some(value))
        });
        let mut roots = Vec::with_capacity(rows.len());
        for (entity, row) in rows {
            session.merge(&entity, row, root_options.columns.as_deref(), root_options.policy);
            roots.push(entity);
        }

        let mut eager: Vec<(&RelationPath, &PathOptions, RelationLoadStrategy)> = self
            .paths
            .iter()
            .filter_map(|(path, options)| options.eager.map(|(_, strategy)| (path, options, strategy)))
            .collect();
        eager.sort_by_key(|(path, _, _)| path.len());

        let mut frontier: HashMap<RelationPath, Vec<EntityRef>> = HashMap::new();
        frontier.insert(root_path, roots.clone());

        for (path, options, strategy) in eager {
            let parent_path = path.parent().unwrap_or_default();
            let parents = frontier.get(&parent_path).cloned().unwrap_or_default();
            if parents.is_empty() {
                frontier.insert(path.clone(), Vec::new());
                continue;
            }

            let (owner, relation) = self
                .relation_at(path)
                .map_err(|e| SelectError::execution(e.to_string()).with_path(path.to_string()))?;
            let parent_rows: Vec<(EntityRef, Row)> = parents
                .iter()
                .filter_map(|p| session.row(p).map(|row| (p.clone(), row.clone())))
                .collect();
            let columns = options.columns.as_deref();

            if strategy.is_separate() {
                let cached = MemoryStore::foreign_targets(relation, &parent_rows)
                    .is_some_and(|targets| targets.iter().all(|t| session.has_columns(t, columns)));
                if !cached {
                    self.store.round_trip(&format_args!("select-in {}", path));
                }
            }

            let related = self.store.fetch_related(owner, relation, &parent_rows)?;
            for (entity, row) in related.targets {
                session.merge(&entity, row, columns, options.policy);
            }
            let mut reached: Vec<EntityRef> = Vec::new();
            for (parent, linked) in related.links {
                for entity in &linked {
                    if !reached.contains(entity) {
                        reached.push(entity.clone());
                    }
                }
                session.set_relation(&parent, &relation.name, linked);
            }
            frontier.insert(path.clone(), reached);
        }

        debug!(
            model = %self.root,
            roots = roots.len(),
            paths = frontier.len() - 1,
            round_trips = self.store.round_trips(),
            "Executed query"
        );
        Ok(roots)
    }

    fn model_at(&self, path: &RelationPath) -> Result<&Model, DirectiveError> {
        let unknown = || DirectiveError::UnknownPath {
            path: path.to_string(),
        };
        let registry = self.store.registry();
        let mut model = registry.get_model(&self.root).ok_or_else(unknown)?;
        for segment in path.segments() {
            let relation = model.get_relation(segment).ok_or_else(unknown)?;
            model = registry.get_model(&relation.target).ok_or_else(unknown)?;
        }
        Ok(model)
    }

    fn relation_at(&self, path: &RelationPath) -> Result<(&Model, &ModelRelation), DirectiveError> {
        let unknown = || DirectiveError::UnknownPath {
            path: path.to_string(),
        };
        let parent = path.parent().ok_or_else(unknown)?;
        let owner = self.model_at(&parent)?;
        let relation = path
            .last()
            .and_then(|name| owner.get_relation(name))
            .ok_or_else(unknown)?;
        Ok((owner, relation))
    }
}

impl LoadQuery for MemoryQuery {
    fn load_only(&mut self, path: &RelationPath, columns: &[SmolStr]) -> Result<(), DirectiveError> {
        let model = self.model_at(path)?;
        if let Some(column) = columns.iter().find(|c| model.get_column(c).is_none()) {
            return Err(DirectiveError::UnknownColumn {
                model: model.name.to_string(),
                column: column.to_string(),
            });
        }
        self.paths.entry(path.clone()).or_default().columns = Some(columns.to_vec());
        Ok(())
    }

    fn eager_load(
        &mut self,
        path: &RelationPath,
        cardinality: Cardinality,
        strategy: RelationLoadStrategy,
    ) -> Result<(), DirectiveError> {
        let (owner, relation) = self.relation_at(path)?;

        if let Some(parent) = path.parent().filter(|p| !p.is_root()) {
            if !self.paths.get(&parent).is_some_and(|o| o.eager.is_some()) {
                return Err(DirectiveError::Unsupported(format!(
                    "'{}' must be eagerly loaded before '{}'",
                    parent, path
                )));
            }
        }
        if strategy == RelationLoadStrategy::Join && matches!(relation.join, Join::Through { .. }) {
            return Err(DirectiveError::UnsupportedRelation {
                relation: relation.name.to_string(),
                reason: "many-to-many relations cannot be joined".into(),
            });
        }
        let target_identity = self
            .store
            .registry()
            .get_model(&relation.target)
            .map_or(0, |m| m.identity().len());
        if owner.identity().len() != 1 || target_identity != 1 {
            return Err(DirectiveError::UnsupportedRelation {
                relation: relation.name.to_string(),
                reason: "composite identities cannot be eagerly loaded".into(),
            });
        }

        self.paths.entry(path.clone()).or_default().eager = Some((cardinality, strategy));
        Ok(())
    }

    fn forbid_unplanned(
        &mut self,
        path: &RelationPath,
        policy: UnplannedAccess,
    ) -> Result<(), DirectiveError> {
        self.model_at(path)?;
        self.paths.entry(path.clone()).or_default().policy = Some(policy);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use shapeload_schema::SchemaRegistry;

    fn store() -> Arc<MemoryStore> {
        let registry = SchemaRegistry::from_source(
            r#"
model Team {
    id      Int      @id
    name    String
    players Player[]
    coaches Coach[]  @relation(through: Staff, local: team_id, remote: coach_id)
}
model Player {
    id      Int    @id
    name    String
    team_id Int    @foreign
    team    Team
}
model Coach {
    id   Int    @id
    name String
}
model Staff {
    id       Int @id
    team_id  Int @foreign
    coach_id Int @foreign
}
"#,
        )
        .unwrap();
        let store = MemoryStore::new(registry);
        for (id, name) in [(1, "red"), (2, "blue")] {
            store.insert("Team", json!({"id": id, "name": name})).unwrap();
        }
        for (id, team) in [(1, 1), (2, 1), (3, 2)] {
            store
                .insert("Player", json!({"id": id, "name": format!("p{id}"), "team_id": team}))
                .unwrap();
        }
        store.insert("Coach", json!({"id": 1, "name": "c1"})).unwrap();
        store.insert("Staff", json!({"id": 1, "team_id": 2, "coach_id": 1})).unwrap();
        store
    }

    #[test]
    fn test_plain_query_loads_whole_rows() {
        let store = store();
        let mut session = store.session();
        let teams = store.query("Team").unwrap().execute(&mut session).unwrap();

        assert_eq!(teams.len(), 2);
        assert_eq!(store.round_trips(), 1);
        assert_eq!(session.column(&teams[0], "name").unwrap(), json!("red"));

        let players = session.related(&teams[0], "players").unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(store.round_trips(), 2);
    }

    #[test]
    fn test_separate_eager_load_is_one_round_trip_per_path() {
        let store = store();
        let mut session = store.session();
        let players = RelationPath::parse("players");
        let team = RelationPath::parse("players.team");

        let mut query = store.query("Team").unwrap();
        query
            .eager_load(&players, Cardinality::Many, RelationLoadStrategy::Separate)
            .unwrap();
        query
            .eager_load(&team, Cardinality::One, RelationLoadStrategy::Separate)
            .unwrap();
        query
            .forbid_unplanned(&RelationPath::root(), UnplannedAccess::Raise)
            .unwrap();
        let teams = query.execute(&mut session).unwrap();

        // Root plus `players`; `players.team` is served by the identity map.
        assert_eq!(store.round_trips(), 2);
        for t in &teams {
            for p in session.related(t, "players").unwrap() {
                assert_eq!(session.related_one(&p, "team").unwrap().as_ref(), Some(t));
            }
        }
        assert_eq!(store.round_trips(), 2);
        assert!(session.related(&teams[0], "coaches").unwrap_err().is_unplanned_load());
    }

    #[test]
    fn test_join_costs_nothing_extra() {
        let store = store();
        let mut session = store.session();
        let mut query = store.query("Team").unwrap().filter_eq("id", 2);
        query
            .eager_load(&RelationPath::parse("players"), Cardinality::Many, RelationLoadStrategy::Join)
            .unwrap();
        let teams = query.execute(&mut session).unwrap();

        assert_eq!(teams.len(), 1);
        assert_eq!(session.related(&teams[0], "players").unwrap().len(), 1);
        assert_eq!(store.round_trips(), 1);
    }

    #[test]
    fn test_empty_parent_set_skips_round_trip() {
        let store = store();
        let mut session = store.session();
        let mut query = store.query("Team").unwrap().filter_eq("name", "green");
        query
            .eager_load(&RelationPath::parse("players"), Cardinality::Many, RelationLoadStrategy::Separate)
            .unwrap();

        assert!(query.execute(&mut session).unwrap().is_empty());
        assert_eq!(store.round_trips(), 1);
    }

    #[test]
    fn test_directive_validation() {
        let store = store();
        let mut query = store.query("Team").unwrap();

        let err = query
            .load_only(&RelationPath::parse("players"), &["id".into(), "age".into()])
            .unwrap_err();
        assert_eq!(
            err,
            DirectiveError::UnknownColumn {
                model: "Player".into(),
                column: "age".into(),
            }
        );

        let err = query
            .eager_load(&RelationPath::parse("staff"), Cardinality::Many, RelationLoadStrategy::Separate)
            .unwrap_err();
        assert!(matches!(err, DirectiveError::UnknownPath { .. }));

        let err = query
            .eager_load(&RelationPath::parse("players.team"), Cardinality::One, RelationLoadStrategy::Join)
            .unwrap_err();
        assert!(matches!(err, DirectiveError::Unsupported(_)));

        let err = query
            .eager_load(&RelationPath::parse("coaches"), Cardinality::Many, RelationLoadStrategy::Join)
            .unwrap_err();
        assert!(matches!(err, DirectiveError::UnsupportedRelation { .. }));

        query
            .eager_load(&RelationPath::parse("coaches"), Cardinality::Many, RelationLoadStrategy::Separate)
            .unwrap();
        assert_eq!(query.eager_paths(), vec![&RelationPath::parse("coaches")]);
    }

    #[test]
    fn test_load_only_restricts_columns() {
        let store = store();
        let mut session = store.session();
        let mut query = store.query("Player").unwrap();
        query.load_only(&RelationPath::root(), &["id".into()]).unwrap();
        query
            .forbid_unplanned(&RelationPath::root(), UnplannedAccess::Noload)
            .unwrap();
        let players = query.execute(&mut session).unwrap();

        assert_eq!(session.column(&players[0], "id").unwrap(), json!(1));
        assert_eq!(session.column(&players[0], "name").unwrap(), Value::Null);
        assert!(session.related(&players[0], "team").unwrap().is_empty());
        assert_eq!(store.round_trips(), 1);
    }

    #[test]
    fn test_unknown_filter_column() {
        let store = store();
        let mut session = store.session();
        let err = store
            .query("Team")
            .unwrap()
            .filter_eq("color", "red")
            .execute(&mut session)
            .unwrap_err();
        assert_eq!(err.context.model.as_deref(), Some("Team"));
    }
}
