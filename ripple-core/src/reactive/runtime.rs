//! Reactive Runtime
//!
//! The runtime connects stores and effects. It owns the dependency bucket and
//! the effect stack, and implements the two operations everything else is
//! built on: `track` and `trigger`.
//!
//! # How It Works
//!
//! 1. An effect runs with itself pushed onto the runtime's effect stack.
//!
//! 2. A store read calls [`Runtime::track`], which records the effect on top
//!    of the stack under `(store, key)`.
//!
//! 3. A store write calls [`Runtime::trigger`], which copies the set recorded
//!    under `(store, key)`, drops the currently running effect from the copy,
//!    and schedules (or runs) the rest in insertion order.
//!
//! # Isolation
//!
//! There is no process-wide active effect. Every `Runtime` carries its own
//! stack and bucket, so independent reactive graphs can live side by side;
//! a store only ever talks to the runtime that wrapped it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::bucket::{DependencyBucket, DependencySnapshot};
use super::context::EffectStack;
use super::effect::{Effect, EffectOptions};
use super::ids::{EffectId, StoreId};
use super::store::Store;
use crate::config::RuntimeConfig;
use crate::error::StoreError;

struct RuntimeInner {
    config: RuntimeConfig,
    bucket: DependencyBucket,
    stack: EffectStack,
}

/// Handle to a reactive runtime.
///
/// Cloning the handle shares the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with `config`.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                bucket: DependencyBucket::new(),
                stack: EffectStack::new(),
            }),
        }
    }

    /// The configuration this runtime was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Label attached to this runtime's log events.
    pub fn label(&self) -> &str {
        &self.inner.config.label
    }

    /// Wrap a plain record so that reads and writes are tracked.
    pub fn wrap<K, V, I>(&self, record: I) -> Store<V>
    where
        K: Into<String>,
        V: Clone + Send + Sync + 'static,
        I: IntoIterator<Item = (K, V)>,
    {
        Store::new(
            self.clone(),
            record.into_iter().map(|(key, value)| (key.into(), value)).collect(),
        )
    }

    /// Wrap a JSON object. Fails if `value` is not an object.
    pub fn wrap_json(&self, value: serde_json::Value) -> Result<Store, StoreError> {
        Store::from_json(self.clone(), value)
    }

    /// Create an effect and run it once.
    ///
    /// The effect keeps reacting only while a handle to it is alive. The
    /// dependency bucket holds effects weakly, so dropping the last
    /// [`Effect`] unsubscribes it: `let _ = runtime.create_effect(..)` runs
    /// the computation once and never again. Keep the handle for as long as
    /// the effect should react, or call [`Effect::dispose`] to stop it early.
    pub fn create_effect<F>(&self, computation: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.create_effect_with(computation, EffectOptions::default())
    }

    /// Create an effect with explicit options.
    ///
    /// Lazy effects are returned without running. The same lifetime rule as
    /// [`Runtime::create_effect`] applies: the effect unsubscribes when its
    /// last handle is dropped.
    pub fn create_effect_with<F>(&self, computation: F, options: EffectOptions) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        let lazy = options.is_lazy();
        let effect = Effect::new(self.clone(), computation, options);
        debug!(runtime = self.label(), effect = %effect.id(), lazy, "created effect");

        if !lazy {
            effect.execute();
        }

        effect
    }

    /// Record that the active effect depends on `(store, key)`.
    ///
    /// No-op when no effect is running.
    pub fn track(&self, store: StoreId, key: &str) {
        let Some(effect) = self.inner.stack.active() else {
            return;
        };
        if effect.is_disposed() {
            return;
        }

        let dep = self.inner.bucket.dep_for(store, key);
        if dep.insert(&effect) {
            trace!(runtime = self.label(), %store, key, effect = %effect.id(), "tracked");
        }
        effect.record_dependency(&dep);
    }

    /// Run or schedule every effect that depends on `(store, key)`, except
    /// the effect currently on top of the stack.
    pub fn trigger(&self, store: StoreId, key: &str) {
        let Some(dep) = self.inner.bucket.get(store, key) else {
            return;
        };

        let active = self.inner.stack.active_id();
        let mut run_set = dep.snapshot();
        let before = run_set.len();
        run_set.retain(|effect| Some(effect.id()) != active);

        if run_set.is_empty() {
            return;
        }

        debug!(
            runtime = self.label(),
            %store,
            key,
            effects = run_set.len(),
            skipped_active = before != run_set.len(),
            "triggering"
        );

        for effect in &run_set {
            effect.schedule();
        }
    }

    /// The effect whose reads are currently being tracked.
    pub fn active_effect(&self) -> Option<EffectId> {
        self.inner.stack.active_id()
    }

    /// Number of effects currently executing (nested runs count separately).
    pub fn stack_depth(&self) -> usize {
        self.inner.stack.depth()
    }

    /// Number of stores with an entry in the dependency bucket.
    pub fn tracked_store_count(&self) -> usize {
        self.inner.bucket.store_count()
    }

    /// Number of live effects depending on `(store, key)`.
    pub fn dependents<V>(&self, store: &Store<V>, key: &str) -> usize
    where
        V: Clone + Send + Sync + 'static,
    {
        self.inner
            .bucket
            .get(store.id(), key)
            .map(|dep| dep.len())
            .unwrap_or(0)
    }

    /// Copy the whole dependency bucket out for inspection or logging.
    pub fn dependency_snapshot(&self) -> DependencySnapshot {
        self.inner.bucket.snapshot()
    }

    pub(crate) fn stack(&self) -> &EffectStack {
        &self.inner.stack
    }

    /// Drop the bucket entry of a store that is going away.
    pub(crate) fn forget_store(&self, store: StoreId) {
        let keys = self.inner.bucket.forget(store);
        if keys > 0 {
            trace!(runtime = self.label(), %store, keys, "released store dependencies");
        }
    }

    /// Whether the dependency bucket has an entry for `store`.
    pub fn is_tracking_store(&self, store: StoreId) -> bool {
        self.inner.bucket.contains_store(store)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("label", &self.label())
            .field("tracked_stores", &self.tracked_store_count())
            .field("stack_depth", &self.stack_depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn track_without_active_effect_is_noop() {
        let runtime = Runtime::new();
        let state = runtime.wrap([("a", 1)]);

        assert_eq!(state.get("a"), Some(1));
        assert_eq!(runtime.tracked_store_count(), 0);
        assert!(runtime.dependency_snapshot().is_empty());
    }

    #[test]
    fn trigger_on_untracked_key_is_noop() {
        let runtime = Runtime::new();
        let state = runtime.wrap([("a", 1)]);

        runtime.trigger(state.id(), "a");
        runtime.trigger(state.id(), "missing");
        assert_eq!(runtime.tracked_store_count(), 0);
    }

    #[test]
    fn track_records_both_sides() {
        let runtime = Runtime::new();
        let state = runtime.wrap([("a", 1), ("b", 2)]);

        let effect = runtime.create_effect({
            let state = state.clone();
            move || {
                state.get("a");
                state.get("a");
                state.get("b");
            }
        });

        assert_eq!(effect.dependency_count(), 2);
        assert_eq!(runtime.dependents(&state, "a"), 1);
        assert_eq!(runtime.dependents(&state, "b"), 1);

        let snapshot = runtime.dependency_snapshot();
        assert_eq!(snapshot.dependents(state.id(), "a"), &[effect.id()]);
    }

    #[test]
    fn triggered_effects_run_in_tracking_order() {
        let runtime = Runtime::new();
        let state = runtime.wrap([("a", 0)]);
        let order = Arc::new(Mutex::new(Vec::new()));

        let effects: Vec<Effect> = (0..3)
            .map(|n| {
                let state = state.clone();
                let order = order.clone();
                runtime.create_effect(move || {
                    state.get("a");
                    order.lock().push(n);
                })
            })
            .collect();

        order.lock().clear();
        state.set("a", 1);

        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(effects.len(), 3);
    }

    #[test]
    fn trigger_skips_only_the_active_effect() {
        let runtime = Runtime::new();
        let state = runtime.wrap([("a", 0)]);
        let observer_runs = Arc::new(AtomicI32::new(0));

        let _observer = runtime.create_effect({
            let state = state.clone();
            let observer_runs = observer_runs.clone();
            move || {
                state.get("a");
                observer_runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        let writer = runtime.create_effect({
            let state = state.clone();
            move || {
                state.update("a", |value| value.unwrap_or(0) + 1);
            }
        });

        // The writer ran once and did not retrigger itself, but the observer
        // saw the write.
        assert_eq!(writer.run_count(), 1);
        assert_eq!(observer_runs.load(Ordering::SeqCst), 2);
        assert_eq!(state.get_untracked("a"), Some(1));
    }

    #[test]
    fn trigger_iterates_a_copy() {
        let runtime = Runtime::new();
        let state = runtime.wrap([("a", 0)]);
        let runs = Arc::new(AtomicI32::new(0));

        // Every run removes the effect from the set and inserts it again.
        // Iterating the live set would revisit it.
        let _effect = runtime.create_effect({
            let state = state.clone();
            let runs = runs.clone();
            move || {
                state.get("a");
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        state.set("a", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn runtimes_are_independent() {
        let first = Runtime::new();
        let second = Runtime::new();
        let state = first.wrap([("a", 0)]);
        let runs = Arc::new(AtomicI32::new(0));

        // Reads inside an effect of another runtime are not attributed to it.
        let _effect = second.create_effect({
            let state = state.clone();
            let runs = runs.clone();
            move || {
                state.get("a");
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        state.set("a", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(second.tracked_store_count(), 0);
    }

    #[test]
    fn custom_label_shows_in_debug() {
        let runtime = Runtime::with_config(RuntimeConfig::new("ui"));
        assert_eq!(runtime.label(), "ui");
        assert!(format!("{runtime:?}").contains("\"ui\""));
    }
}
