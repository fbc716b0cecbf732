//! Effect Implementation
//!
//! An Effect is a re-runnable computation whose store reads are tracked
//! automatically.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs immediately to establish its initial
//!    dependencies (unless it is lazy).
//!
//! 2. When a property it read is written, the runtime hands the effect to its
//!    scheduler, or re-runs it synchronously if it has none.
//!
//! 3. Every run starts by removing the effect from all dependency sets it
//!    belonged to. Only the reads made during the new run are tracked, so a
//!    branch that was not taken this time leaves no stale dependency behind.
//!
//! # Lifetime
//!
//! The dependency bucket refers to effects weakly. An effect stays
//! subscribed for as long as some [`Effect`] handle to it is alive (or a job
//! queue holds it pending). When the last handle drops, the effect removes
//! itself from every dependency set.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::bucket::Dep;
use super::ids::{DepId, EffectId};
use super::runtime::Runtime;

/// Decides when a triggered effect actually runs.
///
/// The scheduler receives the effect every time a write would otherwise have
/// re-run it. Calling [`Effect::execute`] runs it; not calling it skips the
/// run.
pub type Scheduler = Arc<dyn Fn(&Effect) + Send + Sync>;

/// Options accepted by [`Runtime::create_effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    lazy: bool,
    scheduler: Option<Scheduler>,
}

impl EffectOptions {
    /// Eager options with no scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the initial run. The caller runs the effect via
    /// [`Effect::execute`] when it wants the first result.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Route triggered re-runs through `scheduler`.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&Effect) + Send + Sync + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Route triggered re-runs through an already shared scheduler.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Whether the initial run is skipped.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Whether triggered re-runs go through a scheduler.
    pub fn has_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

pub(crate) struct EffectInner {
    /// Unique identifier, used for deduplication.
    id: EffectId,

    /// The runtime whose stack and bucket this effect uses.
    runtime: Runtime,

    /// The user's function.
    computation: Box<dyn Fn() + Send + Sync>,

    /// Laziness and scheduler, fixed at creation.
    options: EffectOptions,

    /// Back-references to every dependency set this effect is a member of.
    deps: Mutex<IndexMap<DepId, Weak<Dep>>>,

    /// Set once by [`Effect::dispose`]; a disposed effect never runs again.
    disposed: AtomicBool,

    /// Number of runs that completed without panicking.
    run_count: AtomicUsize,
}

impl EffectInner {
    /// Remove this effect from every dependency set, then forget the
    /// back-references.
    fn release_dependencies(&self) {
        let deps = std::mem::take(&mut *self.deps.lock());
        if deps.is_empty() {
            return;
        }

        trace!(effect = %self.id, count = deps.len(), "cleaning up dependencies");

        for dep in deps.values().filter_map(Weak::upgrade) {
            dep.remove(self.id);
        }
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        self.release_dependencies();
    }
}

/// Handle to a reactive computation.
///
/// Handles are cheap to clone and share the same effect. Dropping every
/// handle unsubscribes the effect.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let state = runtime.wrap([("count", 0)]);
///
/// let effect = runtime.create_effect({
///     let state = state.clone();
///     move || println!("count is {:?}", state.get("count"))
/// });
///
/// state.set("count", 5); // prints "count is Some(5)"
/// ```
#[derive(Clone)]
#[must_use = "an effect unsubscribes when its last handle is dropped"]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    pub(crate) fn new<F>(runtime: Runtime, computation: F, options: EffectOptions) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EffectInner {
                id: EffectId::new(),
                runtime,
                computation: Box::new(computation),
                options,
                deps: Mutex::new(IndexMap::new()),
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<EffectInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<EffectInner> {
        Arc::downgrade(&self.inner)
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// The runtime this effect tracks its reads in.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// The options the effect was created with.
    pub fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    /// Whether the effect skipped its initial run.
    pub fn is_lazy(&self) -> bool {
        self.inner.options.lazy
    }

    /// Whether triggered re-runs go through a scheduler.
    pub fn has_scheduler(&self) -> bool {
        self.inner.options.scheduler.is_some()
    }

    /// Run the computation now, rebuilding its dependencies.
    ///
    /// This is the re-run procedure used by triggers and job queues, and the
    /// manual entry point for lazy effects. Panics from the computation
    /// propagate to the caller; the effect stack is restored first.
    pub fn execute(&self) {
        if self.is_disposed() {
            return;
        }

        self.inner.release_dependencies();

        let runtime = &self.inner.runtime;
        debug!(runtime = runtime.label(), effect = %self.id(), "running effect");

        let _frame = runtime.stack().enter(self.clone());
        (self.inner.computation)();

        self.inner.run_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Handle a change to one of this effect's dependencies.
    ///
    /// Hands the effect to its scheduler if it has one, otherwise runs it
    /// synchronously.
    pub fn schedule(&self) {
        if self.is_disposed() {
            return;
        }

        match &self.inner.options.scheduler {
            Some(scheduler) => scheduler(self),
            None => self.execute(),
        }
    }

    /// Unsubscribe the effect and stop it from ever running again.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.release_dependencies();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }

    /// Number of dependency sets this effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .deps
            .lock()
            .values()
            .filter(|dep| dep.strong_count() > 0)
            .count()
    }

    /// Record the back-reference half of a new dependency edge.
    pub(crate) fn record_dependency(&self, dep: &Arc<Dep>) {
        self.inner
            .deps
            .lock()
            .entry(dep.id())
            .or_insert_with(|| Arc::downgrade(dep));
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Effect {}

impl std::hash::Hash for Effect {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("options", &self.inner.options)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
