//! Reactive Primitives
//!
//! This module implements dependency tracking: stores, effects, and the
//! runtime that connects them.
//!
//! # Concepts
//!
//! ## Stores
//!
//! A Store wraps a plain key-value record. Reading a key while an effect is
//! running registers that effect as a dependent of `(store, key)`. Writing a
//! key re-runs (or schedules) every dependent effect.
//!
//! ## Effects
//!
//! An Effect is a re-runnable computation. Its dependencies are exactly the
//! store keys it read during its most recent run; they are rebuilt from
//! scratch every time it runs.
//!
//! ## Runtime
//!
//! The Runtime owns the dependency bucket and the stack of running effects.
//! Stores and effects belong to the runtime that created them.
//!
//! # Implementation Notes
//!
//! Reads are attributed to the effect on top of the runtime's effect stack.
//! A write never re-runs the effect that is currently on top of the stack,
//! so an effect can write to a key it also reads (`count += 1`) without
//! recursing into itself. Only the top of the stack is excluded; an outer
//! effect further down is re-run as usual.
//!
//! Mutually triggering effects without a scheduler are not detected. They
//! recurse until the stack overflows.

mod bucket;
mod context;
mod effect;
mod ids;
mod runtime;
mod store;

pub use bucket::DependencySnapshot;
pub use effect::{Effect, EffectOptions, Scheduler};
pub use ids::{EffectId, StoreId};
pub use runtime::Runtime;
pub use store::{Record, Store, WeakStore};
