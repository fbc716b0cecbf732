//! Dependency Bucket
//!
//! The bucket maps `(store, key)` to the set of effects that read that
//! property during their most recent run.
//!
//! # Ownership
//!
//! The outer mapping is keyed by [`StoreId`] alone and never holds a
//! reference to the store itself. A store removes its own entry from the
//! bucket when it is dropped, so the bucket is never the reason a store
//! stays alive.
//!
//! Each dependency set holds weak references to its effects. Effects are
//! owned by their handles (and by the job queue while pending); an effect
//! whose handle is gone is skipped and pruned on the next trigger.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use super::effect::{Effect, EffectInner};
use super::ids::{DepId, EffectId, StoreId};

/// The set of effects depending on one `(store, key)` pair.
///
/// Iteration order is insertion order, which is the order triggered effects
/// run in.
pub(crate) struct Dep {
    id: DepId,
    store: StoreId,
    key: String,
    effects: Mutex<IndexMap<EffectId, Weak<EffectInner>>>,
}

impl Dep {
    fn new(store: StoreId, key: String) -> Self {
        Self {
            id: DepId::new(),
            store,
            key,
            effects: Mutex::new(IndexMap::new()),
        }
    }

    pub(crate) fn id(&self) -> DepId {
        self.id
    }

    pub(crate) fn store(&self) -> StoreId {
        self.store
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Insert an effect. Returns `false` if it was already present.
    pub(crate) fn insert(&self, effect: &Effect) -> bool {
        let mut effects = self.effects.lock();
        if effects.contains_key(&effect.id()) {
            return false;
        }
        effects.insert(effect.id(), effect.downgrade());
        true
    }

    pub(crate) fn remove(&self, effect: EffectId) {
        self.effects.lock().shift_remove(&effect);
    }

    /// Copy the live members out of the set.
    ///
    /// Triggering re-runs effects, and re-running mutates this very set, so
    /// callers iterate the returned copy, never the set itself.
    pub(crate) fn snapshot(&self) -> Vec<Effect> {
        let mut effects = self.effects.lock();
        let mut live = Vec::with_capacity(effects.len());
        effects.retain(|_, weak| match weak.upgrade() {
            Some(inner) => {
                live.push(Effect::from_inner(inner));
                true
            }
            None => false,
        });
        live
    }

    pub(crate) fn len(&self) -> usize {
        self.effects
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn effect_ids(&self) -> Vec<EffectId> {
        self.effects
            .lock()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Two-level association from store identity and key to dependency sets.
pub(crate) struct DependencyBucket {
    stores: Mutex<HashMap<StoreId, HashMap<String, Arc<Dep>>>>,
}

impl DependencyBucket {
    pub(crate) fn new() -> Self {
        Self {
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Get the dependency set for `(store, key)`, creating both levels if
    /// they do not exist yet.
    pub(crate) fn dep_for(&self, store: StoreId, key: &str) -> Arc<Dep> {
        let mut stores = self.stores.lock();
        let keys = stores.entry(store).or_default();
        if let Some(dep) = keys.get(key) {
            return Arc::clone(dep);
        }
        let dep = Arc::new(Dep::new(store, key.to_owned()));
        keys.insert(key.to_owned(), Arc::clone(&dep));
        dep
    }

    /// Get the dependency set for `(store, key)` without creating it.
    pub(crate) fn get(&self, store: StoreId, key: &str) -> Option<Arc<Dep>> {
        self.stores
            .lock()
            .get(&store)
            .and_then(|keys| keys.get(key))
            .map(Arc::clone)
    }

    /// Drop every dependency set recorded for `store`.
    ///
    /// Returns the number of keys that were tracked.
    pub(crate) fn forget(&self, store: StoreId) -> usize {
        // Bind first so the sets are released after the lock.
        let removed = self.stores.lock().remove(&store);
        removed.map(|keys| keys.len()).unwrap_or(0)
    }

    pub(crate) fn contains_store(&self, store: StoreId) -> bool {
        self.stores.lock().contains_key(&store)
    }

    pub(crate) fn store_count(&self) -> usize {
        self.stores.lock().len()
    }

    pub(crate) fn snapshot(&self) -> DependencySnapshot {
        let sets: Vec<Arc<Dep>> = self
            .stores
            .lock()
            .values()
            .flat_map(|keys| keys.values().cloned())
            .collect();

        let mut stores: BTreeMap<StoreId, BTreeMap<String, Vec<EffectId>>> = BTreeMap::new();
        for dep in sets {
            let effects = dep.effect_ids();
            if effects.is_empty() {
                continue;
            }
            stores
                .entry(dep.store())
                .or_default()
                .insert(dep.key().to_owned(), effects);
        }

        DependencySnapshot { stores }
    }
}

/// Point-in-time view of the dependency bucket.
///
/// Lists, for every store, the keys that have live dependents and the
/// effects depending on each key, in trigger order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencySnapshot {
    /// Store, then key, then dependents in trigger order. Keys without live
    /// dependents are left out.
    pub stores: BTreeMap<StoreId, BTreeMap<String, Vec<EffectId>>>,
}

impl DependencySnapshot {
    /// Effects depending on `(store, key)` at the time of the snapshot.
    pub fn dependents(&self, store: StoreId, key: &str) -> &[EffectId] {
        self.stores
            .get(&store)
            .and_then(|keys| keys.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether no store had any live dependents.
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Render the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{EffectOptions, Runtime};

    fn idle_effect(runtime: &Runtime) -> Effect {
        runtime.create_effect_with(|| {}, EffectOptions::new().lazy(true))
    }

    #[test]
    fn dep_for_creates_lazily_and_reuses() {
        let bucket = DependencyBucket::new();
        let store = StoreId::new();

        assert!(bucket.get(store, "a").is_none());
        assert!(!bucket.contains_store(store));

        let first = bucket.dep_for(store, "a");
        let second = bucket.dep_for(store, "a");
        assert_eq!(first.id(), second.id());
        assert!(bucket.get(store, "a").is_some());
        assert_eq!(bucket.store_count(), 1);
    }

    #[test]
    fn dep_insert_is_idempotent() {
        let runtime = Runtime::new();
        let effect = idle_effect(&runtime);
        let bucket = DependencyBucket::new();
        let dep = bucket.dep_for(StoreId::new(), "a");

        assert!(dep.insert(&effect));
        assert!(!dep.insert(&effect));
        assert_eq!(dep.len(), 1);

        dep.remove(effect.id());
        assert_eq!(dep.len(), 0);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let runtime = Runtime::new();
        let first = idle_effect(&runtime);
        let second = idle_effect(&runtime);
        let third = idle_effect(&runtime);
        let bucket = DependencyBucket::new();
        let dep = bucket.dep_for(StoreId::new(), "a");

        dep.insert(&second);
        dep.insert(&first);
        dep.insert(&third);

        let order: Vec<EffectId> = dep.snapshot().iter().map(Effect::id).collect();
        assert_eq!(order, vec![second.id(), first.id(), third.id()]);
    }

    #[test]
    fn dropped_effects_are_pruned() {
        let runtime = Runtime::new();
        let kept = idle_effect(&runtime);
        let dropped = idle_effect(&runtime);
        let bucket = DependencyBucket::new();
        let dep = bucket.dep_for(StoreId::new(), "a");

        dep.insert(&kept);
        dep.insert(&dropped);
        drop(dropped);

        let live = dep.snapshot();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id(), kept.id());
    }

    #[test]
    fn forget_removes_store_entry() {
        let bucket = DependencyBucket::new();
        let store = StoreId::new();
        bucket.dep_for(store, "a");
        bucket.dep_for(store, "b");

        assert_eq!(bucket.forget(store), 2);
        assert!(!bucket.contains_store(store));
        assert_eq!(bucket.forget(store), 0);
    }

    #[test]
    fn snapshot_skips_empty_sets() {
        let runtime = Runtime::new();
        let effect = idle_effect(&runtime);
        let bucket = DependencyBucket::new();
        let store = StoreId::new();

        bucket.dep_for(store, "unused");
        bucket.dep_for(store, "used").insert(&effect);

        let snapshot = bucket.snapshot();
        assert_eq!(snapshot.dependents(store, "used"), &[effect.id()]);
        assert!(snapshot.dependents(store, "unused").is_empty());

        let json = snapshot.to_json().expect("snapshot serializes");
        assert!(json.contains("used"));
        assert!(!json.contains("unused"));
    }
}
