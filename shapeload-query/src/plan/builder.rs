//! Builds load plans from resolved schema graphs.

use std::collections::HashSet;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::{debug, trace};

use super::PlanNode;
use shapeload_schema::{
    Cardinality, ProjectionPolicy, RelationSpec, ResolutionError, ResolveResult, Resolver,
    SchemaKey, SchemaNode,
};

/// Walks a schema graph from its root and produces the [`PlanNode`] tree.
///
/// Cycles are cut with the set of schema instances currently being expanded
/// on the active path, not every instance ever visited: the same schema at
/// two unrelated paths is expanded twice. A relation whose target is already
/// active becomes a terminal node that loads the target's own columns and
/// nothing below it.
#[derive(Debug, Clone, Copy)]
pub struct PlanBuilder<'r> {
    resolver: &'r Resolver,
    projection: ProjectionPolicy,
}

impl<'r> PlanBuilder<'r> {
    /// Create a builder with the default projection policy.
    pub fn new(resolver: &'r Resolver) -> Self {
        Self {
            resolver,
            projection: ProjectionPolicy::default(),
        }
    }

    /// Set the projection policy.
    pub fn projection(mut self, projection: ProjectionPolicy) -> Self {
        self.projection = projection;
        self
    }

    /// The resolver nodes are read from.
    pub fn resolver(&self) -> &'r Resolver {
        self.resolver
    }

    /// Build the plan for a schema instance.
    pub fn build(&self, key: &SchemaKey) -> ResolveResult<PlanNode> {
        let root = self.resolver.resolve(key)?;
        let mut active = HashSet::new();
        let mut plan = self.expand(&root, None, &mut active)?;

        if self.projection == ProjectionPolicy::Union {
            project_union_by_model(&mut plan);
        }

        debug!(
            schema = %key,
            model = %plan.model,
            depth = plan.depth(),
            paths = plan.relation_paths().len(),
            "Built load plan"
        );
        Ok(plan)
    }

    /// Build the plan for an unfiltered schema by name.
    pub fn build_name(&self, name: &str) -> ResolveResult<PlanNode> {
        self.build(&SchemaKey::new(name))
    }

    fn expand(
        &self,
        node: &SchemaNode,
        cardinality: Option<Cardinality>,
        active: &mut HashSet<SchemaKey>,
    ) -> ResolveResult<PlanNode> {
        active.insert(node.key.clone());
        let mut plan = PlanNode::new(node.model.clone(), node.key.clone(), cardinality, node.columns());

        // Field that first claimed each relation.
        let mut claimed: IndexMap<&SmolStr, &RelationSpec> = IndexMap::new();

        for spec in node.relation_fields.values() {
            if let Some(first) = claimed.get(&spec.relation) {
                if first.cardinality != spec.cardinality {
                    return Err(ResolutionError::CardinalityConflict {
                        schema: node.key.to_string(),
                        relation: spec.relation.to_string(),
                        first: first.field.to_string(),
                        second: spec.field.to_string(),
                    });
                }
            } else {
                claimed.insert(&spec.relation, spec);
            }

            let target = self.resolver.target(spec)?;
            let child = if active.contains(&target.key) {
                trace!(
                    schema = %node.key,
                    field = %spec.field,
                    target = %target.key,
                    "Cycle on active path, truncating"
                );
                let mut terminal = PlanNode::new(
                    target.model.clone(),
                    target.key.clone(),
                    Some(spec.cardinality),
                    target.columns(),
                );
                terminal.terminal = true;
                terminal
            } else {
                self.expand(&target, Some(spec.cardinality), active)?
            };

            // Two fields reading the same relation share one path.
            match plan.children.get_mut(&spec.relation) {
                Some(existing) => existing.merge(child),
                None => {
                    plan.children.insert(spec.relation.clone(), child);
                }
            }
        }

        active.remove(&node.key);
        Ok(plan)
    }
}

/// Give every node the union of the columns requested for its model anywhere
/// in the plan.
///
/// An entity reached at two paths is one identity-map entry, so it ends up
/// with the same loaded columns whichever path loads it first.
fn project_union_by_model(plan: &mut PlanNode) {
    let mut by_model: IndexMap<SmolStr, Vec<SmolStr>> = IndexMap::new();
    plan.walk(&mut |_, node| {
        let columns = by_model.entry(node.model.clone()).or_default();
        for column in &node.projected_columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    });
    extend_columns(plan, &by_model);
}

fn extend_columns(node: &mut PlanNode, by_model: &IndexMap<SmolStr, Vec<SmolStr>>) {
    if let Some(columns) = by_model.get(&node.model) {
        for column in columns {
            if !node.projected_columns.contains(column) {
                node.projected_columns.push(column.clone());
            }
        }
    }
    for child in node.children.values_mut() {
        extend_columns(child, by_model);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::plan::RelationPath;
    use shapeload_schema::SchemaRegistry;

    const GALLERY: &str = r#"
model User {
    id         Int    @id
    name       String
    email      String
    avatar     Image? @relation(fields: [avatar_id])
    avatar_id  Int?   @foreign
    images     Image[]
}
model Image {
    id      Int    @id
    url     String
    user_id Int    @foreign
    user    User
}
schema UserSchema for User {
    avatar: ImageSchema
    images: [ImageSchema]
}
schema ImageSchema for Image {
    user: UserSchema
}
schema Tree for User {
    @@fields([id, name, images])
    images: [ImageOnly]
}
schema ImageOnly for Image {}
schema Brief for User {
    @@fields([id, name])
}
schema Narrow for User {
    @@fields([id, images])
    images: [NarrowImage]
}
schema NarrowImage for Image {
    @@fields([id, user])
    user: Brief
}
"#;

    fn resolver() -> Resolver {
        Resolver::new(registry())
    }

    fn registry() -> Arc<SchemaRegistry> {
        SchemaRegistry::from_source(GALLERY).unwrap()
    }

    #[test]
    fn test_acyclic_depth_matches_nesting() {
        let resolver = resolver();
        let plan = PlanBuilder::new(&resolver).build_name("Tree").unwrap();

        assert_eq!(plan.depth(), 1);
        assert_eq!(plan.projected_columns, vec!["id", "name"]);
        let images = &plan.children["images"];
        assert_eq!(images.cardinality, Some(Cardinality::Many));
        assert_eq!(images.projected_columns, vec!["id", "url"]);
        assert!(!images.is_terminal());
    }

    #[test]
    fn test_cycle_is_truncated_at_first_repeat() {
        let resolver = resolver();
        let plan = PlanBuilder::new(&resolver).build_name("UserSchema").unwrap();

        insta::assert_snapshot!(plan.to_string(), @r"
        User(id, name, email)
          avatar: one Image(id, url)
            user: one User(id, name, email) [terminal]
          images: many Image(id, url)
            user: one User(id, name, email) [terminal]
        ");
        for path in ["avatar.user", "images.user"] {
            let node = plan.get(&RelationPath::parse(path)).unwrap();
            assert!(node.is_terminal());
            assert!(node.children.is_empty());
        }
    }

    #[test]
    fn test_same_schema_at_two_paths_expands_twice() {
        let resolver = resolver();
        let plan = PlanBuilder::new(&resolver).build_name("UserSchema").unwrap();

        // ImageSchema is reached through `avatar` and `images`; neither hop
        // has it on the active path, so both are fully expanded.
        for path in ["avatar", "images"] {
            let node = plan.get(&RelationPath::parse(path)).unwrap();
            assert!(!node.is_terminal());
            assert_eq!(node.children.len(), 1);
        }
    }

    #[test]
    fn test_cycle_from_the_other_side() {
        let resolver = resolver();
        let plan = PlanBuilder::new(&resolver).build_name("ImageSchema").unwrap();

        assert_eq!(
            plan.relation_paths(),
            vec![
                RelationPath::parse("user"),
                RelationPath::parse("user.avatar"),
                RelationPath::parse("user.images"),
            ]
        );
        assert!(plan.get(&RelationPath::parse("user.avatar")).unwrap().is_terminal());
        assert!(plan.get(&RelationPath::parse("user.images")).unwrap().is_terminal());
        assert_eq!(plan.depth(), 2);
    }

    #[test]
    fn test_self_reference_is_terminal_under_root() {
        let registry = SchemaRegistry::from_source(
            r#"
model Node {
    id        Int  @id
    parent_id Int? @foreign
    parent    Node? @relation(fields: [parent_id])
}
schema NodeSchema for Node {
    parent: self
}
"#,
        )
        .unwrap();
        let resolver = Resolver::new(registry);
        let plan = PlanBuilder::new(&resolver).build_name("NodeSchema").unwrap();

        assert_eq!(plan.depth(), 1);
        assert!(plan.children["parent"].is_terminal());
    }

    #[test]
    fn test_union_by_model_and_per_path() {
        let resolver = resolver();
        let union = PlanBuilder::new(&resolver).build_name("Narrow").unwrap();
        let per_path = PlanBuilder::new(&resolver)
            .projection(ProjectionPolicy::PerPath)
            .build_name("Narrow")
            .unwrap();

        assert_eq!(per_path.projected_columns, vec!["id"]);
        assert_eq!(per_path.children["images"].children["user"].projected_columns, vec!["id", "name"]);

        assert_eq!(union.projected_columns, vec!["id", "name"]);
        assert_eq!(union.children["images"].children["user"].projected_columns, vec!["id", "name"]);
        assert_eq!(union.children["images"].projected_columns, vec!["id"]);
    }

    #[test]
    fn test_rebuild_is_structurally_equal() {
        let resolver = resolver();
        let builder = PlanBuilder::new(&resolver);
        assert_eq!(builder.build_name("UserSchema").unwrap(), builder.build_name("UserSchema").unwrap());
    }

    #[test]
    fn test_filtered_root_changes_plan() {
        let resolver = resolver();
        let key = SchemaKey::new("UserSchema").exclude(["email", "images", "avatar.user"]);
        let plan = PlanBuilder::new(&resolver).build(&key).unwrap();

        insta::assert_snapshot!(plan.to_string(), @r"
        User(id, name)
          avatar: one Image(id, url)
        ");
    }

    const ALIASED: &str = r#"
schema Doubled for User {
    @@no_auto_fields
    images: [ImageOnly] @only([id])
    photos: [ImageOnly] @attribute(images) @only([url])
}
schema Clash for User {
    @@no_auto_fields
    images: [ImageOnly]
    cover: ImageOnly @attribute(images) @single
}
"#;

    fn aliased_resolver() -> Resolver {
        Resolver::new(SchemaRegistry::from_source(&format!("{GALLERY}{ALIASED}")).unwrap())
    }

    #[test]
    fn test_fields_sharing_a_relation_merge() {
        let resolver = aliased_resolver();
        let plan = PlanBuilder::new(&resolver).build_name("Doubled").unwrap();

        insta::assert_snapshot!(plan.to_string(), @r"
        User(id)
          images: many Image(id, url)
        ");
    }

    #[test]
    fn test_fields_sharing_a_relation_must_agree_on_cardinality() {
        let resolver = aliased_resolver();
        let err = PlanBuilder::new(&resolver).build_name("Clash").unwrap_err();

        assert_eq!(
            err,
            ResolutionError::CardinalityConflict {
                schema: "Clash".into(),
                relation: "images".into(),
                first: "images".into(),
                second: "cover".into(),
            }
        );
    }

    #[test]
    fn test_unknown_schema_is_resolution_error() {
        let resolver = resolver();
        assert!(PlanBuilder::new(&resolver).build_name("Nope").is_err());
    }
}
