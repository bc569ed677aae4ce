//! Pull-style message queue with a timed receive.
//!
//! Any number of producers may `send`; exactly one consumer is expected to call
//! `receive`. Workers of [`PooledExecutor`](super::PooledExecutor) each own one.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// Multi-producer, single-consumer FIFO queue.
#[derive(Debug)]
pub struct MessageQueue<M> {
    items: Mutex<VecDeque<M>>,
    available: Condvar,
}

impl<M> MessageQueue<M> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append a message and wake the consumer. Never drops the message.
    pub fn send(&self, message: M) {
        self.items.lock().push_back(message);
        self.available.notify_one();
    }

    /// Wait up to `timeout` for the next message.
    ///
    /// `None` means the timeout elapsed with nothing queued; it is not an error.
    ///
    /// # Panics
    ///
    /// Panics if a wake-up is observed while the queue is empty, which can only
    /// happen when more than one consumer drains the same queue.
    pub fn receive(&self, timeout: Duration) -> Option<M> {
        let mut items = self.items.lock();
        if items.is_empty() {
            let waited = self
                .available
                .wait_while_for(&mut items, |items| items.is_empty(), timeout);
            if waited.timed_out() {
                return None;
            }
        }

        let message = items.pop_front();
        assert!(
            message.is_some(),
            "message queue signalled while empty: single-consumer protocol violated"
        );
        message
    }

    /// Take the next message without waiting.
    pub fn try_receive(&self) -> Option<M> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<M> Default for MessageQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}
