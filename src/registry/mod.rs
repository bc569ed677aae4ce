//! Name to metric catalog with atomic get-or-create.
//!
//! A registry is the only creator of metrics. For any [`MetricName`] it hands out
//! at most one instance for its whole lifetime: concurrent first requests for a
//! new name all receive the instance that won registration, and construction
//! parameters only apply to that first creation.

mod async_registry;

pub use async_registry::AsyncMetricsRegistry;

use crate::core::{
    default_clock, Clock, Config, DispatchMode, MetricName, MetricsError, Result, TimeUnit,
};
use crate::metrics::{Counter, Histogram, Meter, MetricSettings, ReportValue, SampleSpec, Timer};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// Receives `(name, values, timestamp)` for every reported metric.
pub type ReportCallback = Arc<dyn Fn(&MetricName, &[ReportValue], u64) + Send + Sync>;

/// A registered metric.
#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Histogram(Arc<Histogram>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
}

impl Metric {
    pub fn kind(&self) -> &'static str {
        match self {
            Metric::Counter(_) => "counter",
            Metric::Histogram(_) => "histogram",
            Metric::Meter(_) => "meter",
            Metric::Timer(_) => "timer",
        }
    }

    /// Deliver the metric's value set from inside its mailbox.
    pub fn report<F>(&self, callback: F)
    where
        F: FnOnce(Vec<ReportValue>) + Send + 'static,
    {
        match self {
            Metric::Counter(m) => m.report(callback),
            Metric::Histogram(m) => m.report(callback),
            Metric::Meter(m) => m.report(callback),
            Metric::Timer(m) => m.report(callback),
        }
    }

    /// Identity comparison.
    pub fn same_instance(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::Counter(a), Metric::Counter(b)) => Arc::ptr_eq(a, b),
            (Metric::Histogram(a), Metric::Histogram(b)) => Arc::ptr_eq(a, b),
            (Metric::Meter(a), Metric::Meter(b)) => Arc::ptr_eq(a, b),
            (Metric::Timer(a), Metric::Timer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// One metric's report as collected by [`MetricsRegistry::snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub name: MetricName,
    pub kind: &'static str,
    pub values: Vec<ReportValue>,
    pub timestamp: u64,
}

/// Registry whose metrics use the dispatch policy of its [`MetricSettings`].
pub struct MetricsRegistry {
    metrics: DashMap<MetricName, Metric>,
    settings: MetricSettings,
}

impl MetricsRegistry {
    pub fn new(settings: MetricSettings) -> Self {
        Self {
            metrics: DashMap::new(),
            settings,
        }
    }

    /// Inline-dispatch registry on the system clock.
    pub fn inline() -> Self {
        Self::new(MetricSettings::new(default_clock()))
    }

    /// Inline-dispatch registry with reservoirs and percentiles from `config`.
    ///
    /// Fails when `config` asks for pooled dispatch; build an
    /// [`AsyncMetricsRegistry`] for that.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        if config.registry.dispatch != DispatchMode::Inline {
            return Err(MetricsError::config(
                "pooled dispatch needs a worker pool; use AsyncMetricsRegistry::from_config",
            ));
        }
        Ok(Self::new(settings_from_config(config, default_clock())))
    }

    pub fn settings(&self) -> &MetricSettings {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.settings.clock
    }

    /// Return the metric registered under `name`, creating it with `create` if absent.
    ///
    /// When the name already exists `create` is ignored entirely. `create` runs
    /// with no registry lock held, so it may use the registry itself. Threads
    /// racing on a new name may each build a metric; exactly one is registered
    /// and returned to all of them, and the rest are dropped unused.
    pub fn get_or_create<F>(&self, name: MetricName, create: F) -> Result<Metric>
    where
        F: FnOnce(&MetricSettings) -> Result<Metric>,
    {
        // Fast path: already registered
        if let Some(existing) = self.metrics.get(&name) {
            return Ok(existing.value().clone());
        }

        let candidate = create(&self.settings)?;

        match self.metrics.entry(name) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                tracing::debug!("Registered {} {}", candidate.kind(), e.key());
                e.insert(candidate.clone());
                Ok(candidate)
            },
        }
    }

    /// Existing metric, never constructs.
    pub fn try_get(&self, name: &MetricName) -> Option<Metric> {
        self.metrics.get(name).map(|entry| entry.value().clone())
    }

    /// Existing metric, failing with [`MetricsError::NotFound`] when absent.
    pub fn get(&self, name: &MetricName) -> Result<Metric> {
        self.try_get(name).ok_or_else(|| MetricsError::not_found(name.to_string()))
    }

    pub fn counter(&self, name: MetricName) -> Result<Arc<Counter>> {
        let label = name.to_string();
        match self.get_or_create(name, |s| Ok(Metric::Counter(Arc::new(Counter::new(s)))))? {
            Metric::Counter(counter) => Ok(counter),
            other => Err(mismatch(label, "counter", &other)),
        }
    }

    pub fn meter(&self, name: MetricName) -> Result<Arc<Meter>> {
        self.meter_with_unit(name, self.settings.rate_unit)
    }

    /// Meter reporting rates per `rate_unit` when first created.
    pub fn meter_with_unit(&self, name: MetricName, rate_unit: TimeUnit) -> Result<Arc<Meter>> {
        let label = name.to_string();
        let metric = self.get_or_create(name, |s| {
            let settings = s.clone().with_rate_unit(rate_unit);
            Ok(Metric::Meter(Arc::new(Meter::new(&settings))))
        })?;
        match metric {
            Metric::Meter(meter) => Ok(meter),
            other => Err(mismatch(label, "meter", &other)),
        }
    }

    pub fn histogram(&self, name: MetricName) -> Result<Arc<Histogram>> {
        self.histogram_with(name, self.settings.sample)
    }

    /// Histogram backed by `sample` when first created.
    pub fn histogram_with(&self, name: MetricName, sample: SampleSpec) -> Result<Arc<Histogram>> {
        let label = name.to_string();
        let metric = self.get_or_create(name, |s| {
            let settings = s.clone().with_sample(sample);
            Ok(Metric::Histogram(Arc::new(Histogram::new(&settings)?)))
        })?;
        match metric {
            Metric::Histogram(histogram) => Ok(histogram),
            other => Err(mismatch(label, "histogram", &other)),
        }
    }

    pub fn timer(&self, name: MetricName) -> Result<Arc<Timer>> {
        self.timer_with_unit(name, self.settings.duration_unit)
    }

    /// Timer reporting durations in `duration_unit` when first created.
    pub fn timer_with_unit(&self, name: MetricName, duration_unit: TimeUnit) -> Result<Arc<Timer>> {
        let label = name.to_string();
        let metric = self.get_or_create(name, |s| {
            let settings = s.clone().with_duration_unit(duration_unit);
            Ok(Metric::Timer(Arc::new(Timer::new(&settings)?)))
        })?;
        match metric {
            Metric::Timer(timer) => Ok(timer),
            other => Err(mismatch(label, "timer", &other)),
        }
    }

    /// Timer named by `(group, type, name)` with durations in `unit`.
    pub fn get_timer(
        &self,
        group: &str,
        type_name: &str,
        name: &str,
        unit: TimeUnit,
    ) -> Result<Arc<Timer>> {
        self.timer_with_unit(MetricName::new(group, type_name, name), unit)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<MetricName> {
        let mut names: Vec<MetricName> = self.metrics.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Ask every metric for its report and hand each to `callback` with `timestamp`.
    ///
    /// Metrics are visited in ascending name order. Under pooled dispatch the
    /// callbacks run later, on executor threads.
    pub fn report(&self, callback: &ReportCallback, timestamp: u64) {
        self.report_filtered(callback, timestamp, |_, _| true);
    }

    /// Like [`report`](Self::report), visiting only metrics accepted by `predicate`.
    pub fn report_filtered<P>(&self, callback: &ReportCallback, timestamp: u64, predicate: P)
    where
        P: Fn(&MetricName, &Metric) -> bool,
    {
        for (name, metric) in self.sorted_entries() {
            if !predicate(&name, &metric) {
                continue;
            }
            let callback = Arc::clone(callback);
            metric.report(move |values| callback(&name, &values, timestamp));
        }
    }

    /// [`report`](Self::report) stamped with the registry clock's wall time.
    pub fn report_now(&self, callback: &ReportCallback) {
        let now = self.settings.clock.time();
        self.report(callback, now);
    }

    /// Blocking collection of every metric's report, in ascending name order.
    pub fn snapshot(&self) -> Result<Vec<MetricReport>> {
        let timestamp = self.settings.clock.time();
        let pending: Vec<_> = self
            .sorted_entries()
            .into_iter()
            .map(|(name, metric)| {
                let (tx, rx) = crossbeam_channel::bounded(1);
                metric.report(move |values| {
                    let _ = tx.send(values);
                });
                (name, metric.kind(), rx)
            })
            .collect();

        pending
            .into_iter()
            .map(|(name, kind, rx)| {
                let values = rx.recv().map_err(|_| MetricsError::ReplyLost)?;
                Ok(MetricReport {
                    name,
                    kind,
                    values,
                    timestamp,
                })
            })
            .collect()
    }

    // Clones out of the map so no shard lock is held while metrics report.
    fn sorted_entries(&self) -> Vec<(MetricName, Metric)> {
        let mut entries: Vec<(MetricName, Metric)> = self
            .metrics
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::inline()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("metrics", &self.metrics.len())
            .field("settings", &self.settings)
            .finish()
    }
}

fn mismatch(name: String, expected: &'static str, found: &Metric) -> MetricsError {
    MetricsError::TypeMismatch {
        name,
        expected,
        found: found.kind(),
    }
}

pub(crate) fn settings_from_config(config: &Config, clock: Arc<dyn Clock>) -> MetricSettings {
    MetricSettings::new(clock)
        .with_sample(SampleSpec::from(&config.sampling))
        .with_percentiles(&config.reporting.percentiles)
}
