//! Values a metric hands to reporters.

use crate::core::TimeUnit;
use crate::metrics::snapshot::Snapshot;
use serde::{Serialize, Serializer};
use std::fmt;

/// Averaging window of a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateWindow {
    /// Lifetime average.
    Mean,
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
}

impl RateWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateWindow::Mean => "mean_rate",
            RateWindow::OneMinute => "m1_rate",
            RateWindow::FiveMinutes => "m5_rate",
            RateWindow::FifteenMinutes => "m15_rate",
        }
    }
}

/// What a reported number means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    Count,
    Min,
    Max,
    Mean,
    StdDev,
    /// Quantile in [0, 1].
    Percentile(f64),
    Rate(RateWindow),
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Count => f.write_str("count"),
            ValueKind::Min => f.write_str("min"),
            ValueKind::Max => f.write_str("max"),
            ValueKind::Mean => f.write_str("mean"),
            ValueKind::StdDev => f.write_str("stddev"),
            // 0.5 -> p50, 0.999 -> p99.9
            ValueKind::Percentile(p) => write!(f, "p{}", (p * 1_000.0).round() / 10.0),
            ValueKind::Rate(window) => f.write_str(window.as_str()),
        }
    }
}

impl Serialize for ValueKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Unit of a reported number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    /// Plain count of events or items.
    Items,
    /// A duration.
    Time(TimeUnit),
    /// Events per time unit.
    PerTime(TimeUnit),
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricUnit::Items => f.write_str("items"),
            MetricUnit::Time(unit) => write!(f, "{}", unit),
            MetricUnit::PerTime(unit) => write!(f, "events/{}", unit),
        }
    }
}

impl Serialize for MetricUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One `{kind, value, unit}` entry of a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportValue {
    pub kind: ValueKind,
    pub value: f64,
    pub unit: MetricUnit,
}

impl ReportValue {
    pub fn new(kind: ValueKind, value: f64, unit: MetricUnit) -> Self {
        Self { kind, value, unit }
    }

    pub fn count(count: f64) -> Self {
        Self::new(ValueKind::Count, count, MetricUnit::Items)
    }
}

/// Append min, max, mean, stddev and the requested percentiles of `snapshot`,
/// each passed through `scale`.
pub(crate) fn push_distribution(
    out: &mut Vec<ReportValue>,
    snapshot: &Snapshot,
    percentiles: &[f64],
    unit: MetricUnit,
    scale: impl Fn(f64) -> f64,
) {
    out.push(ReportValue::new(ValueKind::Min, scale(snapshot.min()), unit));
    out.push(ReportValue::new(ValueKind::Max, scale(snapshot.max()), unit));
    out.push(ReportValue::new(ValueKind::Mean, scale(snapshot.mean()), unit));
    out.push(ReportValue::new(ValueKind::StdDev, scale(snapshot.std_dev()), unit));
    for &p in percentiles {
        out.push(ReportValue::new(
            ValueKind::Percentile(p),
            scale(snapshot.value(p)),
            unit,
        ));
    }
}
