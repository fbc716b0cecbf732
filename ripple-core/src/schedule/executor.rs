//! Deferred Executors
//!
//! A deferred executor runs a task after the current synchronous segment of
//! work has finished and before anything queued later. The job queue uses one
//! to place its flush on that boundary.
//!
//! Two implementations are provided:
//!
//! - [`MicrotaskQueue`]: an explicit FIFO that the host drains with
//!   [`MicrotaskQueue::run_until_idle`]. Deterministic; suited to tests and
//!   to hosts with their own event loop.
//! - [`TokioExecutor`]: spawns tasks onto a current-thread tokio runtime. A
//!   spawned task runs once the spawning task yields, which is the microtask
//!   boundary. Multi-thread runtimes are rejected: their workers would run
//!   effects off the runtime's thread and lose the FIFO order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::trace;

use crate::error::ExecutorError;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Schedules tasks to run after the current synchronous execution.
///
/// Implementations must run tasks in the order they were deferred.
pub trait DeferredExecutor: Send + Sync {
    /// Queue `task` to run after the current synchronous work.
    fn defer(&self, task: Task);
}

impl<E> DeferredExecutor for Arc<E>
where
    E: DeferredExecutor + ?Sized,
{
    fn defer(&self, task: Task) {
        (**self).defer(task);
    }
}

/// A FIFO of deferred tasks drained explicitly by the host.
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct MicrotaskQueue {
    tasks: Arc<Mutex<VecDeque<Task>>>,
}

impl MicrotaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued tasks until the queue is empty.
    ///
    /// Tasks deferred while draining run in the same call, after everything
    /// that was already queued. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            // Bind first so the lock is released before the task runs.
            let next = self.tasks.lock().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        if ran > 0 {
            trace!(tasks = ran, "drained microtask queue");
        }
        ran
    }

    /// Number of tasks waiting to run.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether no tasks are waiting.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl DeferredExecutor for MicrotaskQueue {
    fn defer(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// Defers tasks by spawning them onto a current-thread tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    /// Wrap `handle`, which must belong to a current-thread runtime.
    ///
    /// Returns [`ExecutorError::MultiThreaded`] for any other flavor.
    pub fn new(handle: Handle) -> Result<Self, ExecutorError> {
        match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Ok(Self { handle }),
            flavor => Err(ExecutorError::MultiThreaded(flavor)),
        }
    }

    /// Use the runtime the caller is running on.
    pub fn from_current() -> Result<Self, ExecutorError> {
        Self::new(Handle::try_current()?)
    }
}

impl DeferredExecutor for TokioExecutor {
    fn defer(&self, task: Task) {
        // Dropping the JoinHandle detaches the task; it still runs.
        drop(self.handle.spawn(async move { task() }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn microtasks_run_in_fifo_order() {
        let queue = MicrotaskQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let log = log.clone();
            queue.defer(Box::new(move || log.lock().push(n)));
        }

        assert_eq!(queue.len(), 3);
        assert!(log.lock().is_empty());

        assert_eq!(queue.run_until_idle(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn tasks_deferred_while_draining_run_in_same_drain() {
        let queue = MicrotaskQueue::new();
        let count = Arc::new(AtomicUsize::new(0));

        let inner_queue = queue.clone();
        let inner_count = count.clone();
        queue.defer(Box::new(move || {
            inner_count.fetch_add(1, Ordering::SeqCst);
            let inner_count = inner_count.clone();
            inner_queue.defer(Box::new(move || {
                inner_count.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        assert_eq!(queue.run_until_idle(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn tokio_executor_requires_a_runtime() {
        assert!(matches!(
            TokioExecutor::from_current(),
            Err(ExecutorError::NoRuntime(_))
        ));
    }

    #[test]
    fn tokio_executor_rejects_multi_thread_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .build()
            .expect("build runtime");

        let result = TokioExecutor::new(runtime.handle().clone());
        assert!(matches!(
            result,
            Err(ExecutorError::MultiThreaded(RuntimeFlavor::MultiThread))
        ));
    }

    #[test]
    fn tokio_executor_accepts_current_thread_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("build runtime");

        assert!(TokioExecutor::new(runtime.handle().clone()).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn from_current_rejects_multi_thread_runtime() {
        assert!(matches!(
            TokioExecutor::from_current(),
            Err(ExecutorError::MultiThreaded(_))
        ));
    }

    #[tokio::test]
    async fn tokio_executor_runs_after_yield() {
        let executor = TokioExecutor::from_current().expect("inside tokio");
        let count = Arc::new(AtomicUsize::new(0));

        let task_count = count.clone();
        executor.defer(Box::new(move || {
            task_count.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
