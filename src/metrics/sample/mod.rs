//! Reservoirs backing histograms.

pub mod exponential;
pub mod priority_map;
pub mod uniform;

pub use exponential::ExponentiallyDecayingSample;
pub use priority_map::{OrderedPriorityMap, PriorityKey};
pub use uniform::UniformSample;

use crate::core::config::SamplingConfig;
use crate::core::{Clock, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Reservoir capacity used when none is configured.
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// Forward-decay factor used when none is configured.
pub const DEFAULT_ALPHA: f64 = 0.015;

/// Interval between landmark rescales of a biased reservoir.
pub const RESCALE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// Fixed-capacity store of observed values.
///
/// Implementations are owned by a single mailbox and never shared.
pub trait Sample: Send {
    fn update(&mut self, value: f64);

    /// Values currently stored; `min(capacity, observed)`.
    fn size(&self) -> usize;

    fn capacity(&self) -> usize;

    /// Copy of the stored values, in slot order.
    fn snapshot(&self) -> Vec<f64>;

    fn clear(&mut self);
}

/// Reservoir flavour of a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// Forward-decaying reservoir favouring recent values.
    #[default]
    Biased,
    /// Every value ever observed is equally likely to be retained.
    Uniform,
}

/// Everything needed to build a reservoir.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSpec {
    pub kind: SampleKind,
    pub size: usize,
    pub alpha: f64,
    pub rescale_interval: Duration,
}

impl SampleSpec {
    pub fn biased() -> Self {
        Self {
            kind: SampleKind::Biased,
            size: DEFAULT_RESERVOIR_SIZE,
            alpha: DEFAULT_ALPHA,
            rescale_interval: RESCALE_THRESHOLD,
        }
    }

    pub fn uniform() -> Self {
        Self {
            kind: SampleKind::Uniform,
            ..Self::biased()
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Build a reservoir reading time from `clock`.
    pub fn build(&self, clock: Arc<dyn Clock>) -> Result<Box<dyn Sample>> {
        let sample: Box<dyn Sample> = match self.kind {
            SampleKind::Biased => Box::new(
                ExponentiallyDecayingSample::new(self.size, self.alpha, clock)?
                    .with_rescale_interval(self.rescale_interval),
            ),
            SampleKind::Uniform => Box::new(UniformSample::new(self.size)?),
        };
        Ok(sample)
    }
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self::biased()
    }
}

impl From<&SamplingConfig> for SampleSpec {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            kind: config.kind,
            size: config.reservoir_size,
            alpha: config.alpha,
            rescale_interval: config.rescale_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ManualClock, MetricsError};

    #[test]
    fn test_build_each_kind() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());

        let biased = SampleSpec::biased().with_size(16).build(Arc::clone(&clock)).unwrap();
        assert_eq!(biased.capacity(), 16);

        let uniform = SampleSpec::uniform().with_size(8).build(clock).unwrap();
        assert_eq!(uniform.capacity(), 8);
    }

    #[test]
    fn test_build_rejects_zero_size() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        for spec in [SampleSpec::biased(), SampleSpec::uniform()] {
            let result = spec.with_size(0).build(Arc::clone(&clock));
            assert!(matches!(result, Err(MetricsError::InvalidCapacity(0))));
        }
    }

    #[test]
    fn test_spec_from_config() {
        let config = SamplingConfig {
            kind: SampleKind::Uniform,
            reservoir_size: 64,
            alpha: 0.5,
            rescale_interval: Duration::from_secs(30),
        };
        let spec = SampleSpec::from(&config);
        assert_eq!(spec.kind, SampleKind::Uniform);
        assert_eq!(spec.size, 64);
        assert_eq!(spec.rescale_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_kind_serde_names() {
        let kind: SampleKind = serde_yaml::from_str("uniform").unwrap();
        assert_eq!(kind, SampleKind::Uniform);
        assert_eq!(serde_yaml::to_string(&SampleKind::Biased).unwrap().trim(), "biased");
    }
}
