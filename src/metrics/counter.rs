//! Signed event counter.

use crate::core::{Clock, Result};
use crate::mailbox::Mailbox;
use crate::metrics::value::ReportValue;
use crate::metrics::MetricSettings;
use std::sync::Arc;

#[derive(Debug, Default)]
struct CounterState {
    count: i64,
}

/// Counter whose state is confined to its mailbox.
pub struct Counter {
    mailbox: Mailbox<CounterState>,
    clock: Arc<dyn Clock>,
}

impl Counter {
    pub fn new(settings: &MetricSettings) -> Self {
        Self {
            mailbox: Mailbox::new(CounterState::default(), &settings.dispatch),
            clock: Arc::clone(&settings.clock),
        }
    }

    pub fn increment(&self, n: i64) {
        self.mailbox
            .post(move |state| state.count = state.count.wrapping_add(n));
    }

    pub fn decrement(&self, n: i64) {
        self.mailbox
            .post(move |state| state.count = state.count.wrapping_sub(n));
    }

    pub fn inc(&self) {
        self.increment(1);
    }

    pub fn dec(&self) {
        self.decrement(1);
    }

    /// Deliver `(count, wall_time_millis)` once every earlier message from this
    /// thread has been applied.
    pub fn get_count<F>(&self, callback: F)
    where
        F: FnOnce(i64, u64) + Send + 'static,
    {
        let now = self.clock.time();
        self.mailbox.post(move |state| callback(state.count, now));
    }

    /// Blocking read of the current count.
    pub fn count(&self) -> Result<i64> {
        self.mailbox.ask(|state| state.count)
    }

    pub fn clear(&self) {
        self.mailbox.post(|state| state.count = 0);
    }

    /// Deliver the report value set from inside the mailbox.
    pub fn report<F>(&self, callback: F)
    where
        F: FnOnce(Vec<ReportValue>) + Send + 'static,
    {
        self.mailbox
            .post(move |state| callback(vec![ReportValue::count(state.count as f64)]));
    }
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter")
            .field("inline", &self.mailbox.is_inline())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::mailbox::{Dispatch, Executor, PooledExecutor};
    use crate::metrics::value::ValueKind;
    use std::sync::Barrier;
    use std::thread;

    fn inline_counter() -> Counter {
        Counter::new(&MetricSettings::new(Arc::new(ManualClock::new(5_000))))
    }

    #[test]
    fn test_increment_then_decrement() {
        let counter = inline_counter();
        counter.increment(5);
        counter.decrement(2);
        assert_eq!(counter.count().unwrap(), 3);
    }

    #[test]
    fn test_barrier_ordered_threads() {
        let counter = Arc::new(inline_counter());
        let barrier = Arc::new(Barrier::new(2));

        let a = {
            let counter = Arc::clone(&counter);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                counter.increment(5);
                barrier.wait();
            })
        };
        let b = {
            let counter = Arc::clone(&counter);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                counter.decrement(2);
            })
        };
        a.join().unwrap();
        b.join().unwrap();

        assert_eq!(counter.count().unwrap(), 3);
    }

    #[test]
    fn test_concurrent_deltas_sum_pooled() {
        let executor: Arc<dyn Executor> = Arc::new(PooledExecutor::new(4).unwrap());
        let settings = MetricSettings::new(Arc::new(ManualClock::default()))
            .with_dispatch(Dispatch::pooled(executor));
        let counter = Arc::new(Counter::new(&settings));

        let handles: Vec<_> = (0..8_i64)
            .map(|t| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for i in 0..500 {
                        if (t + i) % 3 == 0 {
                            counter.decrement(2);
                        } else {
                            counter.increment(3);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected: i64 = (0..8_i64)
            .flat_map(|t| (0..500).map(move |i| if (t + i) % 3 == 0 { -2 } else { 3 }))
            .sum();
        assert_eq!(counter.count().unwrap(), expected);
    }

    #[test]
    fn test_get_count_carries_wall_time() {
        let counter = inline_counter();
        counter.inc();
        counter.inc();
        counter.dec();

        let (tx, rx) = crossbeam_channel::bounded(1);
        counter.get_count(move |count, time| tx.send((count, time)).unwrap());
        assert_eq!(rx.recv().unwrap(), (1, 5_000));
    }

    #[test]
    fn test_report_and_clear() {
        let counter = inline_counter();
        counter.increment(7);

        let (tx, rx) = crossbeam_channel::bounded(1);
        counter.report(move |values| tx.send(values).unwrap());
        let values = rx.recv().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].kind, ValueKind::Count);
        assert_eq!(values[0].value, 7.0);

        counter.clear();
        assert_eq!(counter.count().unwrap(), 0);
    }
}
