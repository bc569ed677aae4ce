//! Distribution of observed values.

use crate::core::Result;
use crate::mailbox::Mailbox;
use crate::metrics::sample::{Sample, SampleKind};
use crate::metrics::snapshot::Snapshot;
use crate::metrics::value::{push_distribution, MetricUnit, ReportValue};
use crate::metrics::MetricSettings;
use std::sync::Arc;

pub(crate) struct HistogramState {
    sample: Box<dyn Sample>,
    count: u64,
}

impl HistogramState {
    pub(crate) fn new(settings: &MetricSettings) -> Result<Self> {
        Ok(Self {
            sample: settings.sample.build(Arc::clone(&settings.clock))?,
            count: 0,
        })
    }

    pub(crate) fn update(&mut self, value: f64) {
        self.count = self.count.saturating_add(1);
        self.sample.update(value);
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.sample.snapshot())
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }

    pub(crate) fn clear(&mut self) {
        self.count = 0;
        self.sample.clear();
    }
}

/// Histogram whose reservoir is confined to its mailbox.
pub struct Histogram {
    mailbox: Mailbox<HistogramState>,
    kind: SampleKind,
    percentiles: Arc<[f64]>,
}

impl Histogram {
    /// Fails when the configured reservoir is invalid.
    pub fn new(settings: &MetricSettings) -> Result<Self> {
        Ok(Self {
            mailbox: Mailbox::new(HistogramState::new(settings)?, &settings.dispatch),
            kind: settings.sample.kind,
            percentiles: Arc::clone(&settings.percentiles),
        })
    }

    pub fn update(&self, value: f64) {
        self.mailbox.post(move |state| state.update(value));
    }

    /// Blocking copy of the current reservoir.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.mailbox.ask(|state| state.snapshot())
    }

    /// Values ever offered, including those the reservoir dropped.
    pub fn count(&self) -> Result<u64> {
        self.mailbox.ask(|state| state.count())
    }

    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    pub fn clear(&self) {
        self.mailbox.post(HistogramState::clear);
    }

    pub fn report<F>(&self, callback: F)
    where
        F: FnOnce(Vec<ReportValue>) + Send + 'static,
    {
        let percentiles = Arc::clone(&self.percentiles);
        self.mailbox.post(move |state| {
            let snapshot = state.snapshot();
            let mut values = Vec::with_capacity(5 + percentiles.len());
            values.push(ReportValue::count(state.count() as f64));
            push_distribution(&mut values, &snapshot, &percentiles, MetricUnit::Items, |v| v);
            callback(values);
        });
    }
}

impl std::fmt::Debug for Histogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Histogram")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
