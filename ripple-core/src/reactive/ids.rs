//! Identity types for the reactive system.
//!
//! Stores, effects, and dependency sets are compared by identity, never by
//! structure. Each gets a unique ID from its own atomic counter when created.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Unique identifier for a wrapped store.
///
/// This is the key of the dependency bucket's outer mapping. Holding a
/// `StoreId` does not keep the store alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StoreId(u64);

impl StoreId {
    /// Generate a new unique store ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

/// Unique identifier for an effect.
///
/// Dependency sets and the job queue deduplicate effects by this ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// Identifier of a single (store, key) dependency set.
///
/// Effects keep their back-references keyed by this, so re-tracking the
/// same property within one run does not record the set twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct DepId(u64);

impl DepId {
    /// Generate a new unique dependency set ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_ids_are_unique() {
        let id1 = EffectId::new();
        let id2 = EffectId::new();
        let id3 = EffectId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn store_ids_increase() {
        let first = StoreId::new();
        let second = StoreId::new();
        assert!(second.raw() > first.raw());
    }

    #[test]
    fn ids_display_with_kind_prefix() {
        let store = StoreId(7);
        let effect = EffectId(3);
        assert_eq!(store.to_string(), "store#7");
        assert_eq!(effect.to_string(), "effect#3");
    }
}
