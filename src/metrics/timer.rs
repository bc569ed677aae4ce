//! Call rate plus duration distribution.

use crate::core::{Clock, Result, TimeUnit};
use crate::mailbox::Mailbox;
use crate::metrics::histogram::HistogramState;
use crate::metrics::meter::{MeterRates, MeterState};
use crate::metrics::snapshot::Snapshot;
use crate::metrics::value::{push_distribution, MetricUnit, ReportValue};
use crate::metrics::MetricSettings;
use std::sync::Arc;
use std::time::Duration;

// Durations are stored in nanoseconds and scaled on report.
struct TimerState {
    meter: MeterState,
    histogram: HistogramState,
}

/// A meter and a histogram behind one mailbox, so a report sees both at the
/// same point of the timer's history.
pub struct Timer {
    mailbox: Mailbox<TimerState>,
    clock: Arc<dyn Clock>,
    duration_unit: TimeUnit,
    rate_unit: TimeUnit,
    percentiles: Arc<[f64]>,
}

impl Timer {
    pub fn new(settings: &MetricSettings) -> Result<Self> {
        let state = TimerState {
            meter: MeterState::new(Arc::clone(&settings.clock)),
            histogram: HistogramState::new(settings)?,
        };
        Ok(Self {
            mailbox: Mailbox::new(state, &settings.dispatch),
            clock: Arc::clone(&settings.clock),
            duration_unit: settings.duration_unit,
            rate_unit: settings.rate_unit,
            percentiles: Arc::clone(&settings.percentiles),
        })
    }

    /// Record one call that took `duration`.
    pub fn update(&self, duration: Duration) {
        self.record_nanos(TimeUnit::duration_nanos(duration));
    }

    fn record_nanos(&self, nanos: i64) {
        if nanos < 0 {
            return;
        }
        self.mailbox.post(move |state| {
            state.histogram.update(nanos as f64);
            state.meter.mark(1);
        });
    }

    /// Run `op` and record how long it took, also when it unwinds.
    pub fn time<R>(&self, op: impl FnOnce() -> R) -> R {
        let _context = self.time_context();
        op()
    }

    /// Start timing; the duration is recorded on [`TimerContext::stop`] or drop.
    pub fn time_context(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            start: self.clock.tick(),
            stopped: false,
        }
    }

    /// Blocking copy of the duration reservoir, in nanoseconds.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.mailbox.ask(|state| state.histogram.snapshot())
    }

    pub fn count(&self) -> Result<u64> {
        self.mailbox.ask(|state| state.histogram.count())
    }

    pub fn rates(&self) -> Result<MeterRates> {
        let unit = self.rate_unit;
        self.mailbox.ask(move |state| state.meter.rates(unit))
    }

    pub fn duration_unit(&self) -> TimeUnit {
        self.duration_unit
    }

    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    pub fn clear(&self) {
        self.mailbox.post(|state| {
            state.meter.clear();
            state.histogram.clear();
        });
    }

    pub fn report<F>(&self, callback: F)
    where
        F: FnOnce(Vec<ReportValue>) + Send + 'static,
    {
        let percentiles = Arc::clone(&self.percentiles);
        let duration_unit = self.duration_unit;
        let rate_unit = self.rate_unit;
        self.mailbox.post(move |state| {
            let rates = state.meter.rates(rate_unit);
            let snapshot = state.histogram.snapshot();

            let mut values = Vec::with_capacity(9 + percentiles.len());
            values.push(ReportValue::count(state.histogram.count() as f64));
            rates.push_rates(&mut values);
            push_distribution(
                &mut values,
                &snapshot,
                &percentiles,
                MetricUnit::Time(duration_unit),
                |nanos| duration_unit.scale_nanos(nanos),
            );
            callback(values);
        });
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("duration_unit", &self.duration_unit)
            .field("rate_unit", &self.rate_unit)
            .finish_non_exhaustive()
    }
}

/// Running measurement started by [`Timer::time_context`].
#[must_use = "dropping the context immediately records a zero-length duration"]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    start: u64,
    stopped: bool,
}

impl TimerContext<'_> {
    /// Record and return the elapsed time.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        self.stopped = true;
        let elapsed = self.timer.clock.tick().saturating_sub(self.start);
        self.timer.record_nanos(i64::try_from(elapsed).unwrap_or(i64::MAX));
        Duration::from_nanos(elapsed)
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.record();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::metrics::sample::SampleSpec;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn timer_with_clock() -> (Timer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let settings = MetricSettings::new(Arc::clone(&clock) as Arc<dyn Clock>)
            .with_sample(SampleSpec::uniform())
            .with_duration_unit(TimeUnit::Milliseconds);
        (Timer::new(&settings).unwrap(), clock)
    }

    #[test]
    fn test_update_records_nanos() {
        let (timer, _) = timer_with_clock();
        timer.update(Duration::from_millis(3));
        timer.update(Duration::from_millis(7));

        let snapshot = timer.snapshot().unwrap();
        assert_eq!(snapshot.min(), 3_000_000.0);
        assert_eq!(snapshot.max(), 7_000_000.0);
        assert_eq!(timer.count().unwrap(), 2);
        assert_eq!(timer.rates().unwrap().count, 2);
    }

    #[test]
    fn test_time_measures_closure() {
        let (timer, clock) = timer_with_clock();
        let result = timer.time(|| {
            clock.advance(Duration::from_millis(25));
            "done"
        });

        assert_eq!(result, "done");
        assert_eq!(timer.snapshot().unwrap().values(), &[25_000_000.0]);
    }

    #[test]
    fn test_time_records_when_operation_panics() {
        let (timer, clock) = timer_with_clock();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            timer.time(|| {
                clock.advance(Duration::from_millis(4));
                panic!("operation failed");
            })
        }));

        assert!(outcome.is_err());
        assert_eq!(timer.count().unwrap(), 1);
        assert_eq!(timer.snapshot().unwrap().max(), 4_000_000.0);
    }

    #[test]
    fn test_context_stop_records_once() {
        let (timer, clock) = timer_with_clock();
        let context = timer.time_context();
        clock.advance(Duration::from_secs(2));
        assert_eq!(context.stop(), Duration::from_secs(2));
        assert_eq!(timer.count().unwrap(), 1);
    }

    #[test]
    fn test_report_scales_durations() {
        let (timer, clock) = timer_with_clock();
        timer.update(Duration::from_millis(10));
        timer.update(Duration::from_millis(30));
        clock.advance(Duration::from_secs(1));

        let (tx, rx) = crossbeam_channel::bounded(1);
        timer.report(move |values| tx.send(values).unwrap());
        let values = rx.recv().unwrap();

        let by_kind = |label: &str| {
            values
                .iter()
                .find(|v| v.kind.to_string() == label)
                .map(|v| (v.value, v.unit))
                .unwrap()
        };
        assert_eq!(by_kind("count").0, 2.0);
        assert_eq!(by_kind("min"), (10.0, MetricUnit::Time(TimeUnit::Milliseconds)));
        assert_eq!(by_kind("max").0, 30.0);
        assert_eq!(by_kind("mean").0, 20.0);
        let (rate, unit) = by_kind("mean_rate");
        assert!((rate - 2.0).abs() < 1e-9);
        assert_eq!(unit, MetricUnit::PerTime(TimeUnit::Seconds));
    }
}
