//! Metric actors.
//!
//! Every metric owns a [`Mailbox`](crate::mailbox::Mailbox) and a private state
//! block. Updates are posted as messages and never touch shared fields directly;
//! reads and reports are posted too, so they observe a single point in the
//! metric's own serialized history.

pub mod counter;
pub mod ewma;
pub mod histogram;
pub mod meter;
pub mod sample;
pub mod snapshot;
pub mod timer;
pub mod value;

pub use counter::Counter;
pub use ewma::Ewma;
pub use histogram::Histogram;
pub use meter::{Meter, MeterRates};
pub use sample::{Sample, SampleKind, SampleSpec};
pub use snapshot::Snapshot;
pub use timer::{Timer, TimerContext};
pub use value::{MetricUnit, RateWindow, ReportValue, ValueKind};

use crate::core::config::DEFAULT_PERCENTILES;
use crate::core::{Clock, TimeUnit};
use crate::mailbox::Dispatch;
use std::sync::Arc;

/// Construction parameters shared by every metric a registry creates.
#[derive(Clone)]
pub struct MetricSettings {
    pub dispatch: Dispatch,
    pub clock: Arc<dyn Clock>,
    pub sample: SampleSpec,
    pub percentiles: Arc<[f64]>,
    pub rate_unit: TimeUnit,
    pub duration_unit: TimeUnit,
}

impl MetricSettings {
    /// Inline dispatch, biased reservoirs, per-second rates and millisecond durations.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            dispatch: Dispatch::Inline,
            clock,
            sample: SampleSpec::default(),
            percentiles: Arc::from(&DEFAULT_PERCENTILES[..]),
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
        }
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_sample(mut self, sample: SampleSpec) -> Self {
        self.sample = sample;
        self
    }

    pub fn with_percentiles(mut self, percentiles: &[f64]) -> Self {
        self.percentiles = Arc::from(percentiles);
        self
    }

    pub fn with_rate_unit(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = unit;
        self
    }

    pub fn with_duration_unit(mut self, unit: TimeUnit) -> Self {
        self.duration_unit = unit;
        self
    }
}

impl std::fmt::Debug for MetricSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricSettings")
            .field("dispatch", &self.dispatch)
            .field("sample", &self.sample)
            .field("percentiles", &self.percentiles)
            .field("rate_unit", &self.rate_unit)
            .field("duration_unit", &self.duration_unit)
            .finish_non_exhaustive()
    }
}
