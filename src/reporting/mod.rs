//! Periodic reporting of registry contents.

use crate::core::{MetricName, Result};
use crate::metrics::{MetricUnit, ReportValue};
use crate::registry::{MetricsRegistry, ReportCallback};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Consumer of metric reports.
pub trait Reporter: Send + Sync {
    /// Called once per metric per report, possibly from executor threads.
    fn report(&self, name: &MetricName, values: &[ReportValue], timestamp: u64);
}

/// Adapt a reporter to the registry's callback signature.
pub fn callback(reporter: Arc<dyn Reporter>) -> ReportCallback {
    Arc::new(move |name, values, timestamp| reporter.report(name, values, timestamp))
}

/// Emits every report as a `tracing` event on target `meterbox::report`.
#[derive(Debug, Default, Clone)]
pub struct TracingReporter {
    structured: bool,
}

impl TracingReporter {
    /// `structured` serialises the value set as JSON instead of `kind=value` pairs.
    pub fn new(structured: bool) -> Self {
        Self { structured }
    }

    /// Render a value set the way this reporter logs it.
    pub fn render(&self, values: &[ReportValue]) -> String {
        if self.structured {
            return match to_json(values) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("Failed to render report values: {} ({})", e, e.category());
                    String::new()
                },
            };
        }

        let mut out = String::new();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = match value.unit {
                MetricUnit::Items => write!(out, "{}={:.3}", value.kind, value.value),
                unit => write!(out, "{}={:.3}{}", value.kind, value.value, unit),
            };
        }
        out
    }
}

impl Reporter for TracingReporter {
    fn report(&self, name: &MetricName, values: &[ReportValue], timestamp: u64) {
        tracing::info!(
            target: "meterbox::report",
            metric = %name,
            timestamp,
            "{}",
            self.render(values)
        );
    }
}

/// Serialise a value set as a JSON array.
pub fn to_json(values: &[ReportValue]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

/// Drives [`MetricsRegistry::report_now`] on a fixed interval on the tokio runtime.
pub struct ScheduledReporter {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledReporter {
    /// Start reporting every `period`; the first report happens one period from now.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(
        registry: Arc<MetricsRegistry>,
        reporter: Arc<dyn Reporter>,
        period: Duration,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let task_shutdown = Arc::clone(&shutdown);
        let callback = callback(reporter);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        registry.report_now(&callback);
                    }
                    _ = task_shutdown.notified() => {
                        // Final report so nothing recorded since the last tick is lost
                        registry.report_now(&callback);
                        break;
                    }
                }
            }
        });

        tracing::info!("Scheduled reporter started with interval {:?}", period);

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Emit a final report and wait for the reporting task to finish.
    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Reporter task failed: {}", e);
            }
        }
        tracing::info!("Scheduled reporter stopped");
    }
}

impl Drop for ScheduledReporter {
    fn drop(&mut self) {
        if self.handle.take().is_some() {
            self.shutdown.notify_one();
        }
    }
}
