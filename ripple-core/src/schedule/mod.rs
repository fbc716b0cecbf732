//! Scheduling
//!
//! Effects without a scheduler re-run synchronously inside the write that
//! triggered them. This module provides the deferred alternative: a
//! [`JobQueue`] that collects triggered effects and flushes them once per
//! cycle on a [`DeferredExecutor`].
//!
//! The executor is injected, so the flush boundary is whatever the host
//! offers: an explicit [`MicrotaskQueue`] drained by the host's loop, or a
//! tokio runtime via [`TokioExecutor`].

mod executor;
mod queue;

pub use executor::{DeferredExecutor, MicrotaskQueue, Task, TokioExecutor};
pub use queue::JobQueue;
