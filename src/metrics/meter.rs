//! Event rate meter.

use crate::core::{Clock, Result, TimeUnit};
use crate::mailbox::Mailbox;
use crate::metrics::ewma::{Ewma, TICK_INTERVAL};
use crate::metrics::value::{MetricUnit, RateWindow, ReportValue, ValueKind};
use crate::metrics::MetricSettings;
use serde::Serialize;
use std::sync::Arc;

/// Point-in-time view of a meter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeterRates {
    pub count: u64,
    pub mean_rate: f64,
    pub one_minute_rate: f64,
    pub five_minute_rate: f64,
    pub fifteen_minute_rate: f64,
    pub rate_unit: TimeUnit,
}

/// Count plus 1, 5 and 15 minute moving averages, decayed by clock ticks.
pub(crate) struct MeterState {
    count: u64,
    start_tick: u64,
    last_tick: u64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    clock: Arc<dyn Clock>,
}

impl MeterState {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.tick();
        Self {
            count: 0,
            start_tick: now,
            last_tick: now,
            m1: Ewma::one_minute(),
            m5: Ewma::five_minutes(),
            m15: Ewma::fifteen_minutes(),
            clock,
        }
    }

    pub(crate) fn mark(&mut self, n: u64) {
        self.tick_if_necessary();
        self.count = self.count.saturating_add(n);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    /// Run one EWMA tick for every full interval elapsed since the last one.
    fn tick_if_necessary(&mut self) {
        let interval = TICK_INTERVAL.as_nanos() as u64;
        let now = self.clock.tick();
        let age = now.saturating_sub(self.last_tick);
        if age < interval {
            return;
        }

        self.last_tick = now - age % interval;
        for _ in 0..age / interval {
            self.m1.tick();
            self.m5.tick();
            self.m15.tick();
        }
    }

    pub(crate) fn rates(&mut self, unit: TimeUnit) -> MeterRates {
        self.tick_if_necessary();
        MeterRates {
            count: self.count,
            mean_rate: self.mean_rate(unit),
            one_minute_rate: self.m1.rate(unit),
            five_minute_rate: self.m5.rate(unit),
            fifteen_minute_rate: self.m15.rate(unit),
            rate_unit: unit,
        }
    }

    fn mean_rate(&self, unit: TimeUnit) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let elapsed = self.clock.tick().saturating_sub(self.start_tick);
        if elapsed == 0 {
            return 0.0;
        }
        self.count as f64 / elapsed as f64 * unit.nanos_per_unit() as f64
    }

    pub(crate) fn clear(&mut self) {
        *self = MeterState::new(Arc::clone(&self.clock));
    }
}

impl MeterRates {
    /// Append the rate entries of this view.
    pub(crate) fn push_rates(&self, out: &mut Vec<ReportValue>) {
        let unit = MetricUnit::PerTime(self.rate_unit);
        out.push(ReportValue::new(ValueKind::Rate(RateWindow::Mean), self.mean_rate, unit));
        out.push(ReportValue::new(
            ValueKind::Rate(RateWindow::OneMinute),
            self.one_minute_rate,
            unit,
        ));
        out.push(ReportValue::new(
            ValueKind::Rate(RateWindow::FiveMinutes),
            self.five_minute_rate,
            unit,
        ));
        out.push(ReportValue::new(
            ValueKind::Rate(RateWindow::FifteenMinutes),
            self.fifteen_minute_rate,
            unit,
        ));
    }
}

/// Meter whose state is confined to its mailbox.
pub struct Meter {
    mailbox: Mailbox<MeterState>,
    rate_unit: TimeUnit,
}

impl Meter {
    pub fn new(settings: &MetricSettings) -> Self {
        Self {
            mailbox: Mailbox::new(MeterState::new(Arc::clone(&settings.clock)), &settings.dispatch),
            rate_unit: settings.rate_unit,
        }
    }

    /// Record `n` events.
    pub fn mark(&self, n: u64) {
        self.mailbox.post(move |state| state.mark(n));
    }

    /// Record one event.
    pub fn mark_one(&self) {
        self.mark(1);
    }

    /// Blocking read of count and rates.
    pub fn rates(&self) -> Result<MeterRates> {
        let unit = self.rate_unit;
        self.mailbox.ask(move |state| state.rates(unit))
    }

    pub fn count(&self) -> Result<u64> {
        self.mailbox.ask(|state| state.count)
    }

    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    pub fn clear(&self) {
        self.mailbox.post(MeterState::clear);
    }

    pub fn report<F>(&self, callback: F)
    where
        F: FnOnce(Vec<ReportValue>) + Send + 'static,
    {
        let unit = self.rate_unit;
        self.mailbox.post(move |state| {
            let rates = state.rates(unit);
            let mut values = Vec::with_capacity(5);
            values.push(ReportValue::count(rates.count as f64));
            rates.push_rates(&mut values);
            callback(values);
        });
    }
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter")
            .field("rate_unit", &self.rate_unit)
            .finish_non_exhaustive()
    }
}
