//! Job Queue
//!
//! The job queue batches triggered effects and re-runs each of them once per
//! flush cycle.
//!
//! # Algorithm
//!
//! 1. The queue's scheduler adds the triggered effect to a pending set keyed
//!    by effect identity, so scheduling the same effect twice is a no-op.
//!
//! 2. If no flush is in progress, the queue marks one in progress and defers
//!    a flush onto its executor.
//!
//! 3. The flush runs the effects that were pending when it started, in
//!    insertion order. Each effect leaves the pending set only as it is about
//!    to run.
//!
//! 4. When the flush ends, normally or by panic, it clears the in-progress
//!    flag. Anything still pending (effects scheduled during the flush, or
//!    the rest of a batch cut short by a panic) gets a fresh cycle.
//!
//! Any number of synchronous writes between two flushes therefore collapse
//! into a single run per effect.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::executor::DeferredExecutor;
use crate::reactive::{Effect, EffectId, Scheduler};

struct JobQueueInner {
    pending: Mutex<IndexMap<EffectId, Effect>>,
    flushing: AtomicBool,
    cycles: AtomicU64,
    executor: Box<dyn DeferredExecutor>,
}

/// Deduplicating, batching queue of effect re-runs.
///
/// Clones share the same queue.
///
/// # Example
///
/// ```rust,ignore
/// let microtasks = MicrotaskQueue::new();
/// let jobs = JobQueue::new(microtasks.clone());
///
/// let effect = runtime.create_effect_with(
///     move || render(&state),
///     EffectOptions::new().with_scheduler(jobs.scheduler()),
/// );
///
/// state.set("a", 1);
/// state.set("b", 2);
/// microtasks.run_until_idle(); // `render` runs once
/// ```
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<JobQueueInner>,
}

impl JobQueue {
    /// Create an empty queue that defers its flushes onto `executor`.
    pub fn new<E>(executor: E) -> Self
    where
        E: DeferredExecutor + 'static,
    {
        Self {
            inner: Arc::new(JobQueueInner {
                pending: Mutex::new(IndexMap::new()),
                flushing: AtomicBool::new(false),
                cycles: AtomicU64::new(0),
                executor: Box::new(executor),
            }),
        }
    }

    /// A scheduler that enqueues into this queue, for
    /// [`EffectOptions::with_scheduler`](crate::reactive::EffectOptions::with_scheduler).
    pub fn scheduler(&self) -> Scheduler {
        let queue = self.clone();
        Arc::new(move |effect: &Effect| queue.enqueue(effect))
    }

    /// Add `effect` to the pending set and make sure a flush is on its way.
    pub fn enqueue(&self, effect: &Effect) {
        let added = {
            let mut pending = self.inner.pending.lock();
            if pending.contains_key(&effect.id()) {
                false
            } else {
                pending.insert(effect.id(), effect.clone());
                true
            }
        };

        if added {
            trace!(effect = %effect.id(), "queued effect");
        }

        self.request_flush();
    }

    fn request_flush(&self) {
        if self
            .inner
            .flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let queue = self.clone();
        self.inner.executor.defer(Box::new(move || queue.flush()));
    }

    fn flush(&self) {
        let _flushing = FlushGuard { queue: self };

        let batch = self.inner.pending.lock().len();
        let cycle = self.inner.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(cycle, jobs = batch, "flushing job queue");

        // Arrivals during the flush land behind the batch and wait for the
        // next cycle.
        for _ in 0..batch {
            let next = self.inner.pending.lock().shift_remove_index(0);
            match next {
                Some((_, effect)) => effect.execute(),
                None => break,
            }
        }
    }

    /// Number of effects waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Whether a flush has been requested and has not finished yet.
    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.load(Ordering::Acquire)
    }

    /// Number of flush cycles started so far.
    pub fn flush_count(&self) -> u64 {
        self.inner.cycles.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("pending", &self.pending_len())
            .field("flushing", &self.is_flushing())
            .field("cycles", &self.flush_count())
            .finish()
    }
}

/// Ends a flush cycle, including by panic: clears the in-progress flag and
/// requests another cycle if effects are still pending.
struct FlushGuard<'a> {
    queue: &'a JobQueue,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.queue.inner.flushing.store(false, Ordering::Release);
        if self.queue.pending_len() > 0 {
            self.queue.request_flush();
        }
    }
}
