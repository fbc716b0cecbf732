//! Reactive Store
//!
//! A Store wraps a plain key-value record so that reads and writes go
//! through the runtime.
//!
//! # How Stores Work
//!
//! 1. [`Store::get`] records the running effect (if any) as a dependent of
//!    `(store, key)`, then returns the value unchanged.
//!
//! 2. [`Store::set`] writes the record first and only then triggers, so
//!    effects that re-run observe the new value.
//!
//! 3. Missing keys are passed through: reading one yields `None` (and is
//!    still tracked, so a later write that creates the key re-runs the
//!    reader), writing one creates it.
//!
//! # Memory
//!
//! Store identity is the key of the runtime's dependency bucket. The bucket
//! never holds the store; when the last handle drops, the store removes its
//! own bucket entry.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::ids::StoreId;
use super::runtime::Runtime;
use crate::error::StoreError;

/// The plain record a store wraps. Keys keep their insertion order.
pub type Record<V> = IndexMap<String, V>;

struct StoreInner<V> {
    id: StoreId,
    runtime: Runtime,
    record: RwLock<Record<V>>,
}

impl<V> Drop for StoreInner<V> {
    fn drop(&mut self) {
        self.runtime.forget_store(self.id);
    }
}

/// A tracked key-value record.
///
/// Handles are cheap to clone and share the same record. Values default to
/// [`serde_json::Value`] so arbitrary records can be wrapped.
pub struct Store<V = Value> {
    inner: Arc<StoreInner<V>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Store<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(runtime: Runtime, record: Record<V>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                id: StoreId::new(),
                runtime,
                record: RwLock::new(record),
            }),
        }
    }

    /// Get the store's unique ID.
    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// The runtime that wrapped this store.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Read `key`, tracking it for the running effect.
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.runtime.track(self.id(), key);
        self.inner.record.read().get(key).cloned()
    }

    /// Read `key`, tracking it, and fail if it is absent.
    pub fn try_get(&self, key: &str) -> Result<V, StoreError> {
        self.get(key).ok_or_else(|| StoreError::MissingKey(key.to_owned()))
    }

    /// Borrow the value of `key` without cloning it. Tracked like `get`.
    ///
    /// The record is read-locked while `f` runs. Any write to this store
    /// that happens before `f` returns deadlocks, whether `f` writes itself
    /// or writes to another store whose dependents synchronously write back
    /// to this one. Use [`Store::get`] when the closure needs to write.
    pub fn with<R>(&self, key: &str, f: impl FnOnce(Option<&V>) -> R) -> R {
        self.inner.runtime.track(self.id(), key);
        let record = self.inner.record.read();
        f(record.get(key))
    }

    /// Read `key` without establishing a dependency.
    pub fn get_untracked(&self, key: &str) -> Option<V> {
        self.inner.record.read().get(key).cloned()
    }

    /// Write `key`, then trigger its dependents.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let previous = self.inner.record.write().insert(key.clone(), value);
        // Drop the old value outside the lock.
        drop(previous);

        self.inner.runtime.trigger(self.id(), &key);
    }

    /// Read `key` (tracked) and write back the result of `f`.
    ///
    /// Inside an effect this is the read-then-write shape that the
    /// self-trigger guard exists for.
    pub fn update(&self, key: &str, f: impl FnOnce(Option<V>) -> V) {
        let current = self.get(key);
        self.set(key, f(current));
    }

    /// Delete `key`. Triggers its dependents if it was present.
    pub fn remove(&self, key: &str) -> Option<V> {
        let removed = self.inner.record.write().shift_remove(key);
        if removed.is_some() {
            self.inner.runtime.trigger(self.id(), key);
        }
        removed
    }

    /// Untracked membership check.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.record.read().contains_key(key)
    }

    /// Untracked list of keys, in record order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.record.read().keys().cloned().collect()
    }

    /// Untracked number of keys.
    pub fn len(&self) -> usize {
        self.inner.record.read().len()
    }

    /// Untracked check for an empty record.
    pub fn is_empty(&self) -> bool {
        self.inner.record.read().is_empty()
    }

    /// Untracked copy of the underlying record.
    pub fn snapshot(&self) -> Record<V> {
        self.inner.record.read().clone()
    }

    /// A reference that does not keep the store alive.
    pub fn downgrade(&self) -> WeakStore<V> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Store<Value> {
    pub(crate) fn from_json(runtime: Runtime, value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Ok(Self::new(runtime, map.into_iter().collect())),
            other => Err(StoreError::NotAnObject(json_kind(&other))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl<V> Serialize for Store<V>
where
    V: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.inner.record.read();
        serializer.collect_map(record.iter())
    }
}

impl<V> fmt::Debug for Store<V>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("record", &*self.inner.record.read())
            .finish()
    }
}

/// Weak handle to a [`Store`].
pub struct WeakStore<V = Value> {
    inner: Weak<StoreInner<V>>,
}

impl<V> WeakStore<V> {
    /// Get a strong handle, or `None` if the store has been dropped.
    pub fn upgrade(&self) -> Option<Store<V>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }

    /// Whether the store still has a strong handle somewhere.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<V> Clone for WeakStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
