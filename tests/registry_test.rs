//! Registry and metric behaviour under concurrent producers.

mod common;

use common::{inline_registry, manual_clock, name, pooled_registry, run_concurrently};
use meterbox::core::TimeUnit;
use meterbox::metrics::ValueKind;
use meterbox::{Metric, MetricsError, ReportCallback};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn expected_sum(threads: usize, per_thread: usize) -> i64 {
    (0..threads)
        .flat_map(|t| (0..per_thread).map(move |i| delta(t, i)))
        .sum()
}

fn delta(thread: usize, i: usize) -> i64 {
    if (thread + i) % 4 == 0 {
        -3
    } else {
        i64::try_from(i % 7).unwrap()
    }
}

#[test]
fn test_counter_serializable_inline() {
    let clock = manual_clock();
    let registry = Arc::new(inline_registry(&clock));

    let shared = Arc::clone(&registry);
    run_concurrently(8, move |t| {
        let counter = shared.counter(name("ops")).unwrap();
        for i in 0..1_000 {
            let d = delta(t, i);
            if d < 0 {
                counter.decrement(-d);
            } else {
                counter.increment(d);
            }
        }
    });

    let counter = registry.counter(name("ops")).unwrap();
    assert_eq!(counter.count().unwrap(), expected_sum(8, 1_000));
}

#[test]
fn test_counter_serializable_pooled() {
    let clock = manual_clock();
    let registry = Arc::new(pooled_registry(&clock, 3));

    let shared = Arc::clone(&registry);
    run_concurrently(8, move |t| {
        let counter = shared.counter(name("ops")).unwrap();
        for i in 0..1_000 {
            let d = delta(t, i);
            if d < 0 {
                counter.decrement(-d);
            } else {
                counter.increment(d);
            }
        }
    });

    // Each producer's writes are queued before this read, so they are all visible
    let counter = registry.counter(name("ops")).unwrap();
    assert_eq!(counter.count().unwrap(), expected_sum(8, 1_000));
}

#[test]
fn test_get_or_create_race_every_kind() {
    let clock = manual_clock();
    let registry = Arc::new(pooled_registry(&clock, 2));

    let shared = Arc::clone(&registry);
    let results = run_concurrently(12, move |t| match t % 4 {
        0 => Metric::Counter(shared.counter(name("counter")).unwrap()),
        1 => Metric::Histogram(shared.histogram(name("histogram")).unwrap()),
        2 => Metric::Meter(shared.meter(name("meter")).unwrap()),
        _ => Metric::Timer(shared.timer(name("timer")).unwrap()),
    });

    for (i, metric) in results.iter().enumerate() {
        assert!(metric.same_instance(&results[i % 4]), "thread {} got a duplicate", i);
    }
    assert_eq!(registry.len(), 4);
}

#[test]
fn test_get_timer_scenario() {
    let clock = manual_clock();
    let registry = inline_registry(&clock);

    let first = registry
        .get_timer("group", "type", "name", TimeUnit::Seconds)
        .unwrap();
    let second = registry
        .get_timer("group", "type", "name", TimeUnit::Seconds)
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.names().len(), 1);
    assert_eq!(registry.names()[0].to_string(), "group.type.name");
}

#[test]
fn test_kind_conflict_is_reported() {
    let clock = manual_clock();
    let registry = inline_registry(&clock);
    registry.meter(name("shared")).unwrap();

    let err = registry.histogram(name("shared")).unwrap_err();
    assert_eq!(err.category(), "registry");
    assert!(matches!(err, MetricsError::TypeMismatch { found: "meter", .. }));
}

#[test]
fn test_pooled_report_reaches_callback() {
    let clock = manual_clock();
    let registry = pooled_registry(&clock, 2);
    registry.counter(name("a")).unwrap().increment(10);
    registry.timer(name("b")).unwrap().update(Duration::from_millis(40));

    let (tx, rx) = crossbeam_channel::unbounded();
    let callback: ReportCallback = Arc::new(move |name, values, timestamp| {
        let _ = tx.send((name.name().to_string(), values.to_vec(), timestamp));
    });
    registry.report(&callback, 1234);

    let mut reports: Vec<_> = (0..2)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    reports.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(reports[0].0, "a");
    assert_eq!(reports[0].1[0].value, 10.0);
    assert_eq!(reports[0].2, 1234);

    let max = reports[1]
        .1
        .iter()
        .find(|v| v.kind == ValueKind::Max)
        .unwrap();
    assert_eq!(max.value, 40.0);
}

#[test]
fn test_snapshots_follow_history_during_updates() {
    let clock = manual_clock();
    let registry = Arc::new(pooled_registry(&clock, 4));
    let timer = registry.timer(name("latency")).unwrap();

    let producer = {
        let timer = Arc::clone(&timer);
        std::thread::spawn(move || {
            for ms in 1..=2_000_u64 {
                timer.update(Duration::from_millis(ms % 50));
            }
        })
    };

    // Each snapshot is a later point of the same serialized history
    let mut last = 0.0;
    for _ in 0..20 {
        let reports = registry.snapshot().unwrap();
        let values = &reports[0].values;
        let count = values.iter().find(|v| v.kind == ValueKind::Count).unwrap();
        assert!(count.value >= last && count.value <= 2_000.0);
        last = count.value;
    }
    producer.join().unwrap();

    assert_eq!(timer.count().unwrap(), 2_000);
    assert_eq!(timer.rates().unwrap().count, 2_000);
}
