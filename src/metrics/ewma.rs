//! Exponentially-weighted moving average rates.
//!
//! Events are accumulated between ticks; every tick folds the instantaneous rate
//! of the last interval into the average with weight `alpha`, where
//! `alpha = 1 - exp(-interval / window)`.

use crate::core::TimeUnit;
use std::time::Duration;

/// Interval between EWMA ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Ewma {
    alpha: f64,
    interval_nanos: f64,
    uncounted: u64,
    // Events per nanosecond.
    rate: f64,
    initialized: bool,
}

impl Ewma {
    pub fn new(alpha: f64, interval: Duration) -> Self {
        Self {
            alpha,
            interval_nanos: interval.as_nanos() as f64,
            uncounted: 0,
            rate: 0.0,
            initialized: false,
        }
    }

    /// Average over a window of `minutes`, ticked every [`TICK_INTERVAL`].
    pub fn over_minutes(minutes: u32) -> Self {
        let window = f64::from(minutes) * 60.0;
        let alpha = 1.0 - (-TICK_INTERVAL.as_secs_f64() / window).exp();
        Self::new(alpha, TICK_INTERVAL)
    }

    pub fn one_minute() -> Self {
        Self::over_minutes(1)
    }

    pub fn five_minutes() -> Self {
        Self::over_minutes(5)
    }

    pub fn fifteen_minutes() -> Self {
        Self::over_minutes(15)
    }

    pub fn update(&mut self, n: u64) {
        self.uncounted = self.uncounted.saturating_add(n);
    }

    /// Fold the events seen since the last tick into the average.
    pub fn tick(&mut self) {
        let instant_rate = self.uncounted as f64 / self.interval_nanos;
        self.uncounted = 0;
        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }

    /// Current rate in events per `unit`.
    pub fn rate(&self, unit: TimeUnit) -> f64 {
        self.rate * unit.nanos_per_unit() as f64
    }
}
