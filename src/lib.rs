//! meterbox - concurrent in-process metrics engine.
//!
//! A registry of named counters, histograms, meters and timers that absorb
//! high-frequency concurrent updates without locking application-visible state.
//!
//! # Features
//!
//! - **Mailbox confinement**: every metric's state is mutated by one serialized
//!   message stream, inline on the caller or drained by a worker pool
//! - **Forward-decay reservoirs**: histograms biased towards recent values, with
//!   periodic landmark rescaling so weights never overflow
//! - **Get-or-create registry**: exactly one instance per metric name, even under
//!   racing first access
//! - **Scheduled reporting**: periodic traversal into any [`Reporter`]
//!
//! # Architecture
//!
//! - `core`: names, tags, clocks, time units, configuration and errors
//! - `mailbox`: confinement primitive and execution strategies
//! - `metrics`: metric actors, reservoirs and snapshot statistics
//! - `registry`: synchronous and pooled registries
//! - `reporting`: reporters and the scheduled reporting task
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```
//! use meterbox::{MetricName, MetricsRegistry};
//!
//! let registry = MetricsRegistry::inline();
//! let requests = registry.counter(MetricName::new("app", "Server", "requests")).unwrap();
//! requests.increment(5);
//! requests.decrement(2);
//! assert_eq!(requests.count().unwrap(), 3);
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod mailbox;
pub mod metrics;
pub mod registry;
pub mod reporting;

// Re-export core types for convenience
pub use crate::core::{Clock, Config, MetricName, MetricsError, Result, Tags, TimeUnit};
pub use crate::mailbox::{
    Dispatch, Executor, InlineExecutor, Mailbox, PooledExecutor, TokioExecutor,
};
pub use crate::metrics::{Counter, Histogram, Meter, MetricSettings, ReportValue, Snapshot, Timer};
pub use crate::registry::{AsyncMetricsRegistry, Metric, MetricsRegistry, ReportCallback};
pub use crate::reporting::{Reporter, ScheduledReporter, TracingReporter};
