//! Memoized plans.
//!
//! A plan depends only on the schema instance and the projection policy, so a
//! cache built next to one [`PlanBuilder`] configuration can hand the same
//! immutable tree to every request.
//!
//! ```rust,ignore
//! use shapeload_query::plan::{PlanBuilder, PlanCache};
//!
//! let cache = PlanCache::new();
//! let builder = PlanBuilder::new(&resolver);
//! let plan = cache.get_or_build(&builder, &SchemaKey::new("UserSchema"))?;
//! assert_eq!(cache.stats().misses, 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{PlanBuilder, PlanNode};
use shapeload_schema::{ResolveResult, SchemaKey};

/// Statistics about cache usage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
}

impl CacheStats {
    /// Calculate the hit rate.
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A thread-safe cache of built plans keyed by schema instance.
#[derive(Debug, Default)]
pub struct PlanCache {
    plans: RwLock<HashMap<SchemaKey, Arc<PlanNode>>>,
    stats: RwLock<CacheStats>,
}

impl PlanCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached plan.
    pub fn get(&self, key: &SchemaKey) -> Option<Arc<PlanNode>> {
        let found = self.plans.read().get(key).cloned();
        let mut stats = self.stats.write();
        if found.is_some() {
            stats.hits += 1;
            debug!(schema = %key, "PlanCache hit");
        } else {
            stats.misses += 1;
            debug!(schema = %key, "PlanCache miss");
        }
        found
    }

    /// Insert a plan, returning the one now cached for `key`.
    ///
    /// A plan already cached for the key wins.
    pub fn insert(&self, key: SchemaKey, plan: PlanNode) -> Arc<PlanNode> {
        let mut plans = self.plans.write();
        Arc::clone(plans.entry(key).or_insert_with(|| Arc::new(plan)))
    }

    /// Get a cached plan or build and cache it.
    pub fn get_or_build(&self, builder: &PlanBuilder<'_>, key: &SchemaKey) -> ResolveResult<Arc<PlanNode>> {
        if let Some(plan) = self.get(key) {
            return Ok(plan);
        }
        let plan = builder.build(key)?;
        Ok(self.insert(key.clone(), plan))
    }

    /// Check if a plan is cached for `key`.
    pub fn contains(&self, key: &SchemaKey) -> bool {
        self.plans.read().contains_key(key)
    }

    /// Remove a cached plan.
    pub fn remove(&self, key: &SchemaKey) -> Option<Arc<PlanNode>> {
        self.plans.write().remove(key)
    }

    /// Clear the cache.
    pub fn clear(&self) {
        self.plans.write().clear();
    }

    /// Number of cached plans.
    pub fn len(&self) -> usize {
        self.plans.read().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }

    /// Reset cache statistics.
    pub fn reset_stats(&self) {
        *self.stats.write() = CacheStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapeload_schema::{Resolver, SchemaRegistry};

    fn resolver() -> Resolver {
        let registry = SchemaRegistry::from_source(
            r#"
model Tag {
    id    Int    @id
    label String
}
schema TagSchema for Tag {}
"#,
        )
        .unwrap();
        Resolver::new(registry)
    }

    #[test]
    fn test_get_or_build_caches() {
        let resolver = resolver();
        let builder = PlanBuilder::new(&resolver);
        let cache = PlanCache::new();
        let key = SchemaKey::new("TagSchema");

        let first = cache.get_or_build(&builder, &key).unwrap();
        let second = cache.get_or_build(&builder, &key).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
        assert!((cache.stats().hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_filtered_keys_are_distinct() {
        let resolver = resolver();
        let builder = PlanBuilder::new(&resolver);
        let cache = PlanCache::new();

        cache.get_or_build(&builder, &SchemaKey::new("TagSchema")).unwrap();
        let narrow = cache
            .get_or_build(&builder, &SchemaKey::new("TagSchema").only(["id"]))
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(narrow.projected_columns, vec!["id"]);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let resolver = resolver();
        let builder = PlanBuilder::new(&resolver);
        let cache = PlanCache::new();

        assert!(cache.get_or_build(&builder, &SchemaKey::new("Ghost")).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_clear_and_reset() {
        let resolver = resolver();
        let cache = PlanCache::new();
        let key = SchemaKey::new("TagSchema");
        cache.get_or_build(&PlanBuilder::new(&resolver), &key).unwrap();

        assert!(cache.contains(&key));
        cache.clear();
        cache.reset_stats();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
