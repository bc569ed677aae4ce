//! Core building blocks shared by every metric.
//!
//! Identity types, time sources, configuration and the crate error type live
//! here; nothing in this module knows about mailboxes or metric state.

pub mod clock;
pub mod config;
pub mod error;
pub mod time_unit;
pub mod types;

// Re-export commonly used types
pub use clock::{default_clock, Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigBuilder, DispatchMode};
pub use error::{MetricsError, Result};
pub use time_unit::TimeUnit;
pub use types::{tag_cache_key, MetricName, Tags};
