//! Execution strategies that pooled mailboxes hand their drain turns to.

use crate::core::{MetricsError, Result};
use crate::mailbox::queue::MessageQueue;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Unit of work submitted to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// How long an idle worker waits before re-checking the shutdown flag.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Something that runs tasks.
pub trait Executor: Send + Sync {
    /// Run `task`, now or later. Mailboxes never rely on ordering between tasks.
    ///
    /// Returns [`MetricsError::ExecutorShutdown`] when the task was refused; the
    /// task has then been dropped without running.
    fn execute(&self, task: Task) -> Result<()>;
}

/// Runs every task immediately on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    #[inline]
    fn execute(&self, task: Task) -> Result<()> {
        task();
        Ok(())
    }
}

/// Fixed set of dedicated worker threads.
///
/// Each worker drains its own [`MessageQueue`]; tasks are spread round-robin.
/// Tasks submitted after [`shutdown`](Self::shutdown) are refused.
pub struct PooledExecutor {
    queues: Vec<Arc<MessageQueue<Task>>>,
    next: AtomicUsize,
    shutdown: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PooledExecutor {
    /// Spawn `workers` threads.
    pub fn new(workers: usize) -> Result<Self> {
        Self::with_name(workers, "meterbox-worker")
    }

    /// Spawn `workers` threads named `{prefix}-{index}`.
    pub fn with_name(workers: usize, prefix: &str) -> Result<Self> {
        if workers == 0 {
            return Err(MetricsError::config("executor needs at least one worker"));
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut queues = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for index in 0..workers {
            let queue = Arc::new(MessageQueue::new());
            let worker_queue = Arc::clone(&queue);
            let worker_shutdown = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("{prefix}-{index}"))
                .spawn(move || run_worker(&worker_queue, &worker_shutdown))?;
            queues.push(queue);
            handles.push(handle);
        }

        tracing::debug!("Started pooled executor with {} workers", workers);

        Ok(Self {
            queues,
            next: AtomicUsize::new(0),
            shutdown,
            handles: Mutex::new(handles),
        })
    }

    pub fn workers(&self) -> usize {
        self.queues.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting work, let workers finish what is queued, and join them.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        let current = thread::current().id();
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            // A worker shutting down its own pool cannot join itself.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("Executor worker panicked during shutdown");
            }
        }

        tracing::debug!("Pooled executor shut down");
    }
}

impl Executor for PooledExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        if self.is_shutdown() {
            return Err(MetricsError::ExecutorShutdown);
        }

        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.queues.len();
        self.queues[index].send(task);
        Ok(())
    }
}

impl Drop for PooledExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(queue: &MessageQueue<Task>, shutdown: &AtomicBool) {
    loop {
        match queue.receive(WORKER_POLL_INTERVAL) {
            Some(task) => {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    tracing::error!("Executor task panicked");
                }
            },
            None => {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
            },
        }
    }
}

/// Runs tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        self.handle.spawn(async move { task() });
        Ok(())
    }
}
