//! Effective field computation.
//!
//! Turns a [`SchemaKey`] into the concrete list of output fields: flatten the
//! `extends` chain, add auto-generated column fields, drop `load_only` fields,
//! then apply the definition options and the instance filters. Dotted filter
//! paths are split here and attached to the nested field they descend into, so
//! traversal never has to deal with filtering.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::key::{SchemaKey, intersect, split_path};
use crate::ast::{FieldDef, FieldKind, Model, SchemaDef};
use crate::error::{ResolutionError, ResolveResult};
use crate::registry::SchemaRegistry;

/// A field that survived filtering.
#[derive(Debug, Clone)]
pub(crate) struct EffectiveField {
    pub def: FieldDef,
    /// For nested fields: `only` for the target instance.
    pub only: Option<BTreeSet<SmolStr>>,
    /// For nested fields: `exclude` for the target instance.
    pub exclude: BTreeSet<SmolStr>,
}

/// The effective shape of one schema instance.
#[derive(Debug)]
pub(crate) struct EffectiveSchema<'r> {
    pub model: &'r Model,
    pub fields: Vec<EffectiveField>,
}

/// The `extends` chain of a schema, starting with the schema itself.
pub(crate) fn chain<'r>(
    registry: &'r SchemaRegistry,
    name: &str,
) -> ResolveResult<Vec<&'r SchemaDef>> {
    let mut chain: Vec<&SchemaDef> = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(SmolStr::new(name));

    while let Some(next) = current {
        if !seen.insert(next.clone()) {
            let mut names: Vec<&str> = chain.iter().map(|d| d.name()).collect();
            names.push(&next);
            return Err(ResolutionError::ExtendsCycle {
                schema: name.to_string(),
                chain: names.join(" -> "),
            });
        }
        let def = registry
            .get_schema(&next)
            .ok_or_else(|| ResolutionError::UnknownSchema {
                name: next.to_string(),
            })?;
        current = def.extends.clone();
        chain.push(def);
    }

    Ok(chain)
}

/// The model a schema is bound to, looking through its bases.
pub fn bound_model<'r>(registry: &'r SchemaRegistry, name: &str) -> ResolveResult<&'r Model> {
    let chain = chain(registry, name)?;
    model_of_chain(registry, &chain, name)
}

fn model_of_chain<'r>(
    registry: &'r SchemaRegistry,
    chain: &[&SchemaDef],
    name: &str,
) -> ResolveResult<&'r Model> {
    let model = chain
        .iter()
        .find_map(|d| d.model.as_ref())
        .ok_or_else(|| ResolutionError::UnboundModel {
            schema: name.to_string(),
        })?;
    registry
        .get_model(model)
        .ok_or_else(|| ResolutionError::UnknownModel {
            schema: name.to_string(),
            model: model.to_string(),
        })
}

/// Filters for one level after dotted paths were split.
#[derive(Debug, Default)]
struct LevelFilter {
    only: Option<BTreeSet<SmolStr>>,
    exclude: BTreeSet<SmolStr>,
    nested_only: BTreeMap<SmolStr, Option<BTreeSet<SmolStr>>>,
    nested_exclude: BTreeMap<SmolStr, BTreeSet<SmolStr>>,
}

impl LevelFilter {
    /// Add an `only`-style list. Lists combine by intersection.
    fn restrict(&mut self, paths: &[SmolStr]) {
        let mut heads = BTreeSet::new();
        let mut rests: BTreeMap<SmolStr, BTreeSet<SmolStr>> = BTreeMap::new();
        for path in paths {
            let (head, rest) = split_path(path);
            heads.insert(SmolStr::new(head));
            if let Some(rest) = rest {
                rests.entry(SmolStr::new(head)).or_default().insert(SmolStr::new(rest));
            }
        }
        self.only = intersect(self.only.take(), Some(heads));
        for (head, rest) in rests {
            let slot = self.nested_only.entry(head).or_insert(None);
            *slot = intersect(slot.take(), Some(rest));
        }
    }

    /// Add an `exclude`-style list. Lists combine by union.
    fn remove(&mut self, paths: &[SmolStr]) {
        for path in paths {
            match split_path(path) {
                (head, None) => {
                    self.exclude.insert(SmolStr::new(head));
                }
                (head, Some(rest)) => {
                    self.nested_exclude
                        .entry(SmolStr::new(head))
                        .or_default()
                        .insert(SmolStr::new(rest));
                }
            }
        }
    }

    fn keeps(&self, name: &str) -> bool {
        let listed = self.only.as_ref().is_none_or(|only| only.contains(name));
        listed && !self.exclude.contains(name)
    }
}

/// Compute the effective fields of a schema instance.
pub(crate) fn effective_schema<'r>(
    registry: &'r SchemaRegistry,
    key: &SchemaKey,
) -> ResolveResult<EffectiveSchema<'r>> {
    let chain = chain(registry, &key.name)?;
    let model = model_of_chain(registry, &chain, &key.name)?;
    let own = chain[0];

    // Base fields first; a redeclared name keeps its original position.
    let mut declared: IndexMap<SmolStr, &FieldDef> = IndexMap::new();
    for def in chain.iter().rev() {
        for (name, field) in &def.fields {
            declared.insert(name.clone(), field);
        }
    }

    let mut fields: IndexMap<SmolStr, FieldDef> = IndexMap::new();
    if own.options.auto_fields {
        for column in model.columns.values() {
            if declared.contains_key(&column.name) {
                continue;
            }
            if column.is_foreign && !own.options.include_fk {
                continue;
            }
            fields.insert(column.name.clone(), FieldDef::scalar(column.name.clone()));
        }
    }
    for (name, field) in declared {
        fields.insert(name, field.clone());
    }

    let instance_only: Option<Vec<SmolStr>> = key.only.as_ref().map(|s| s.iter().cloned().collect());
    let instance_exclude: Vec<SmolStr> = key.exclude.iter().cloned().collect();

    let mut filter = LevelFilter::default();
    if let Some(names) = &own.options.fields {
        check_names(key, &fields, "fields", names)?;
        filter.restrict(names);
    }
    if let Some(names) = &instance_only {
        check_names(key, &fields, "only", names)?;
        filter.restrict(names);
    }
    check_names(key, &fields, "exclude", &own.options.exclude)?;
    filter.remove(&own.options.exclude);
    check_names(key, &fields, "exclude", &instance_exclude)?;
    filter.remove(&instance_exclude);

    let mut effective = Vec::with_capacity(fields.len());
    for (name, def) in fields {
        if def.load_only || !filter.keeps(&name) {
            continue;
        }

        let (only, exclude) = match &def.kind {
            FieldKind::Nested { only, exclude, .. } => {
                let declared_only = only.as_ref().map(|v| v.iter().cloned().collect());
                let pushed_only = filter.nested_only.get(&name).cloned().flatten();
                let mut exclude: BTreeSet<SmolStr> = exclude.iter().cloned().collect();
                if let Some(pushed) = filter.nested_exclude.get(&name) {
                    exclude.extend(pushed.iter().cloned());
                }
                (intersect(declared_only, pushed_only), exclude)
            }
            FieldKind::Scalar => (None, BTreeSet::new()),
        };

        effective.push(EffectiveField { def, only, exclude });
    }

    Ok(EffectiveSchema {
        model,
        fields: effective,
    })
}

/// Every filter entry must name a declared field; dotted entries must descend
/// into a nested one.
fn check_names(
    key: &SchemaKey,
    fields: &IndexMap<SmolStr, FieldDef>,
    option: &str,
    names: &[SmolStr],
) -> ResolveResult<()> {
    for path in names {
        let (head, rest) = split_path(path);
        let field = fields
            .get(head)
            .ok_or_else(|| ResolutionError::UnknownField {
                schema: key.name.to_string(),
                field: head.to_string(),
                option: option.to_string(),
            })?;
        if rest.is_some() && !field.is_nested() {
            return Err(ResolutionError::NotNested {
                schema: key.name.to_string(),
                field: head.to_string(),
                path: path.to_string(),
            });
        }
    }
    Ok(())
}
