//! Common test utilities and fixtures.

#![allow(dead_code)]

use meterbox::core::{Clock, ManualClock, MetricName};
use meterbox::mailbox::{Dispatch, Executor, PooledExecutor};
use meterbox::metrics::MetricSettings;
use meterbox::MetricsRegistry;
use std::sync::{Arc, Barrier};
use std::thread;

/// Wall time every manual clock starts at (2023-11-14T22:13:20Z).
pub const START_MILLIS: u64 = 1_700_000_000_000;

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(START_MILLIS))
}

/// Name in the shared test group.
pub fn name(n: &str) -> MetricName {
    MetricName::new("tests", "Fixture", n)
}

/// Inline registry driven by `clock`.
pub fn inline_registry(clock: &Arc<ManualClock>) -> MetricsRegistry {
    let clock = Arc::clone(clock) as Arc<dyn Clock>;
    MetricsRegistry::new(MetricSettings::new(clock))
}

/// Pooled registry on its own worker pool, driven by `clock`.
pub fn pooled_registry(clock: &Arc<ManualClock>, workers: usize) -> MetricsRegistry {
    let executor: Arc<dyn Executor> = Arc::new(PooledExecutor::new(workers).unwrap());
    let clock = Arc::clone(clock) as Arc<dyn Clock>;
    MetricsRegistry::new(MetricSettings::new(clock).with_dispatch(Dispatch::Pooled {
        executor,
        throughput: 8,
    }))
}

/// Run `f(thread_index)` on `threads` threads released together by a barrier,
/// returning the results in thread order.
pub fn run_concurrently<T, F>(threads: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|index| {
            let f = Arc::clone(&f);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                f(index)
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

/// Assert two floats are within `tolerance`.
#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr) => {
        assert_close!($left, $right, 1e-9)
    };
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let (left, right): (f64, f64) = ($left, $right);
        assert!(
            (left - right).abs() <= $tolerance,
            "{} is not within {} of {}",
            left,
            $tolerance,
            right
        );
    }};
}
