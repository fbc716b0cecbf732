//! Ripple Core
//!
//! This crate provides fine-grained reactive dependency tracking. It
//! implements:
//!
//! - Tracked key-value stores
//! - Effects whose dependencies are discovered automatically and rebuilt on
//!   every run
//! - Batched, deduplicated re-execution through a job queue
//!
//! Rendering layers consume it by wrapping their render function in an
//! effect.
//!
//! # Architecture
//!
//! - `reactive`: stores, effects, the dependency bucket, and the runtime
//! - `schedule`: job queue and deferred executors
//! - `config`: runtime configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use parking_lot::Mutex;
//! use ripple_core::reactive::Runtime;
//! use serde_json::json;
//!
//! let runtime = Runtime::new();
//! let state = runtime.wrap_json(json!({ "text": "a", "count": 0 })).unwrap();
//! let output = Arc::new(Mutex::new(Vec::new()));
//!
//! let _effect = runtime.create_effect({
//!     let state = state.clone();
//!     let output = output.clone();
//!     move || output.lock().push(state.get("text"))
//! });
//!
//! state.set("text", json!("b"));
//! state.update("count", |count| json!(count.and_then(|c| c.as_i64()).unwrap_or(0) + 1));
//!
//! assert_eq!(*output.lock(), vec![Some(json!("a")), Some(json!("b"))]);
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod schedule;

pub use config::RuntimeConfig;
pub use error::{ConfigError, ExecutorError, StoreError};
pub use reactive::{Effect, EffectOptions, Runtime, Store};
pub use schedule::{JobQueue, MicrotaskQueue, TokioExecutor};
