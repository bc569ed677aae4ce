//! Per-metric state confinement.
//!
//! A [`Mailbox`] owns one piece of state and only ever touches it from a single
//! serialized stream of messages. Producers never lock the state themselves; they
//! post closures. Messages posted to one mailbox run one at a time, in the order
//! they were posted. There is no ordering between different mailboxes.
//!
//! Two dispatch policies are available:
//! - [`Dispatch::Inline`]: the posting thread runs its own message, excluded from
//!   every other poster by a lock. Reads observe all writes the same thread made.
//! - [`Dispatch::Pooled`]: posting appends to a backlog and returns. The first
//!   post into an idle mailbox schedules a drain turn on the executor, which runs
//!   queued messages FIFO until the backlog is empty or the throughput limit is hit.
//!
//! Posting to a pooled mailbox whose executor has been shut down is a caller error:
//! the backlog is discarded without running, and pending reads fail with
//! [`MetricsError::ReplyLost`].

pub mod executor;
pub mod queue;

pub use executor::{Executor, InlineExecutor, PooledExecutor, Task, TokioExecutor};
pub use queue::MessageQueue;

use crate::core::{MetricsError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Messages a pooled mailbox runs per drain turn before yielding its worker.
pub const DEFAULT_THROUGHPUT: usize = 64;

/// A state-mutation message.
pub type Message<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Dispatch policy chosen when a mailbox is created.
#[derive(Clone)]
pub enum Dispatch {
    /// Execute on the posting thread under mutual exclusion.
    Inline,
    /// Enqueue and let `executor` drain the backlog.
    Pooled {
        executor: Arc<dyn Executor>,
        throughput: usize,
    },
}

impl Dispatch {
    /// Pooled dispatch with the default throughput.
    pub fn pooled(executor: Arc<dyn Executor>) -> Self {
        Dispatch::Pooled {
            executor,
            throughput: DEFAULT_THROUGHPUT,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Dispatch::Inline)
    }
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatch::Inline => f.write_str("Inline"),
            Dispatch::Pooled { throughput, .. } => f
                .debug_struct("Pooled")
                .field("throughput", throughput)
                .finish_non_exhaustive(),
        }
    }
}

/// Single-writer container for metric state.
pub struct Mailbox<S> {
    inner: Inner<S>,
}

enum Inner<S> {
    Inline(Mutex<S>),
    Pooled {
        cell: Arc<PooledCell<S>>,
        executor: Arc<dyn Executor>,
        throughput: usize,
    },
}

struct PooledCell<S> {
    backlog: Mutex<Backlog<S>>,
    // Only the drain turn in progress locks this, so it is never contended.
    state: Mutex<S>,
}

struct Backlog<S> {
    messages: VecDeque<Message<S>>,
    scheduled: bool,
}

impl<S: Send + 'static> Mailbox<S> {
    pub fn new(state: S, dispatch: &Dispatch) -> Self {
        let inner = match dispatch {
            Dispatch::Inline => Inner::Inline(Mutex::new(state)),
            Dispatch::Pooled {
                executor,
                throughput,
            } => Inner::Pooled {
                cell: Arc::new(PooledCell {
                    backlog: Mutex::new(Backlog {
                        messages: VecDeque::new(),
                        scheduled: false,
                    }),
                    state: Mutex::new(state),
                }),
                executor: Arc::clone(executor),
                throughput: (*throughput).max(1),
            },
        };
        Self { inner }
    }

    /// Post a message. Never blocks beyond a short critical section under pooled
    /// dispatch; under inline dispatch waits for any message already running.
    ///
    /// A message must not post to, or read from, its own mailbox under inline dispatch.
    pub fn post<F>(&self, message: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        match &self.inner {
            Inner::Inline(state) => {
                let mut state = state.lock();
                message(&mut *state);
            },
            Inner::Pooled {
                cell,
                executor,
                throughput,
            } => {
                let needs_turn = {
                    let mut backlog = cell.backlog.lock();
                    backlog.messages.push_back(Box::new(message));
                    !std::mem::replace(&mut backlog.scheduled, true)
                };
                if needs_turn {
                    schedule(cell, executor, *throughput);
                }
            },
        }
    }

    /// Post a read and block until it has run, returning its result.
    ///
    /// Because messages are FIFO, the result reflects every message this thread
    /// posted before. Must not be called from inside a message of the same mailbox.
    pub fn ask<R, F>(&self, query: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.post(move |state| {
            let _ = tx.send(query(state));
        });
        rx.recv().map_err(|_| MetricsError::ReplyLost)
    }

    /// Messages queued but not yet run. Always 0 under inline dispatch.
    pub fn pending(&self) -> usize {
        match &self.inner {
            Inner::Inline(_) => 0,
            Inner::Pooled { cell, .. } => cell.backlog.lock().messages.len(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.inner, Inner::Inline(_))
    }
}

fn schedule<S: Send + 'static>(
    cell: &Arc<PooledCell<S>>,
    executor: &Arc<dyn Executor>,
    throughput: usize,
) {
    let turn_cell = Arc::clone(cell);
    let turn_executor = Arc::clone(executor);
    let turn = executor.execute(Box::new(move || {
        drain(&turn_cell, &turn_executor, throughput);
    }));

    if let Err(e) = turn {
        let discarded = {
            let mut backlog = cell.backlog.lock();
            backlog.scheduled = false;
            std::mem::take(&mut backlog.messages)
        };
        tracing::warn!("Discarded {} mailbox messages: {}", discarded.len(), e);
    }
}

fn drain<S: Send + 'static>(
    cell: &Arc<PooledCell<S>>,
    executor: &Arc<dyn Executor>,
    throughput: usize,
) {
    for _ in 0..throughput {
        let message = {
            let mut backlog = cell.backlog.lock();
            match backlog.messages.pop_front() {
                Some(message) => message,
                None => {
                    backlog.scheduled = false;
                    return;
                },
            }
        };

        let mut state = cell.state.lock();
        if catch_unwind(AssertUnwindSafe(|| message(&mut *state))).is_err() {
            tracing::error!("Mailbox message panicked; continuing with the next message");
        }
    }

    // Throughput exhausted with the turn still marked scheduled: hand the rest to a new turn.
    schedule(cell, executor, throughput);
}
