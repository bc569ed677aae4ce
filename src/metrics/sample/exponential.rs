//! Forward-decaying priority reservoir.
//!
//! Each update gets priority `exp(alpha * (t - landmark)) / u` with `u` drawn from
//! the open interval (0, 1). The reservoir keeps the `capacity` highest priorities,
//! so recent values are more likely to be retained (Cormode et al., "Forward
//! Decay: A Practical Time Decay Model for Streaming Systems").
//!
//! The exponent grows with time since the landmark. Once per rescale interval the
//! landmark moves to "now" and every stored priority is multiplied by
//! `exp(-alpha * (new - old))`, which preserves their ratios and so their ranking.
//! Priorities saturate at `f64::MAX`; with a large enough alpha the ranking among
//! saturated entries is lost, but no priority ever becomes NaN.

use crate::core::{Clock, MetricsError, Result};
use crate::metrics::sample::priority_map::OrderedPriorityMap;
use crate::metrics::sample::{Sample, DEFAULT_ALPHA, DEFAULT_RESERVOIR_SIZE, RESCALE_THRESHOLD};
use rand::distributions::Open01;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

pub struct ExponentiallyDecayingSample {
    values: Vec<f64>,
    count: usize,
    priorities: OrderedPriorityMap<usize>,
    alpha: f64,
    landmark: u64,
    next_rescale: u64,
    rescale_interval: u64,
    clock: Arc<dyn Clock>,
    rng: StdRng,
}

impl ExponentiallyDecayingSample {
    /// Create a reservoir of `capacity` values.
    ///
    /// Fails with [`MetricsError::InvalidCapacity`] when `capacity` is 0.
    pub fn new(capacity: usize, alpha: f64, clock: Arc<dyn Clock>) -> Result<Self> {
        if capacity == 0 {
            return Err(MetricsError::InvalidCapacity(capacity));
        }
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(MetricsError::config(format!(
                "alpha must be a finite, non-negative number, got {}",
                alpha
            )));
        }

        let rescale_interval = duration_nanos(RESCALE_THRESHOLD);
        Ok(Self {
            values: vec![0.0; capacity],
            count: 0,
            priorities: OrderedPriorityMap::new(),
            alpha,
            landmark: clock.time_secs(),
            next_rescale: clock.tick().saturating_add(rescale_interval),
            rescale_interval,
            clock,
            rng: StdRng::from_entropy(),
        })
    }

    /// A 1028-value reservoir with alpha 0.015, which biases towards roughly the
    /// last five minutes.
    pub fn with_defaults(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(DEFAULT_RESERVOIR_SIZE, DEFAULT_ALPHA, clock)
    }

    /// Use a deterministic random source.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Change how often the landmark is moved.
    pub fn with_rescale_interval(mut self, interval: Duration) -> Self {
        self.rescale_interval = duration_nanos(interval).max(1);
        self.next_rescale = self.clock.tick().saturating_add(self.rescale_interval);
        self
    }

    /// Record `value` as observed at `timestamp` (wall-clock seconds).
    pub fn update_at(&mut self, value: f64, timestamp: u64) {
        let weight = self.weight(timestamp);
        let u: f64 = self.rng.sample(Open01);
        // Saturate instead of reaching infinity, so rescaling never computes inf * 0.
        let priority = (weight / u).min(f64::MAX);

        if self.count < self.values.len() {
            self.priorities.insert(priority, self.count);
            self.values[self.count] = value;
            self.count += 1;
        } else if let Some((min_key, &slot)) = self.priorities.min() {
            if priority > min_key.priority() {
                self.priorities.remove(&min_key);
                self.priorities.insert(priority, slot);
                self.values[slot] = value;
            }
        }

        let tick = self.clock.tick();
        if tick >= self.next_rescale {
            self.rescale_at(self.clock.time_secs(), tick);
        }
    }

    /// Move the landmark to `now` (wall-clock seconds) and renormalize priorities.
    pub fn rescale(&mut self, now: u64) {
        let tick = self.clock.tick();
        self.rescale_at(now, tick);
    }

    fn rescale_at(&mut self, now: u64, tick: u64) {
        self.next_rescale = tick.saturating_add(self.rescale_interval);
        let old_landmark = self.landmark;
        self.landmark = now;

        let factor = (-self.alpha * (now as f64 - old_landmark as f64)).exp();
        self.priorities.rekey(|priority| priority * factor);

        tracing::trace!(
            "Rescaled reservoir landmark {} -> {} (factor {:e}, {} entries)",
            old_landmark,
            now,
            factor,
            self.priorities.len()
        );
    }

    fn weight(&self, timestamp: u64) -> f64 {
        (self.alpha * (timestamp as f64 - self.landmark as f64)).exp()
    }

    /// Current landmark in wall-clock seconds.
    pub fn landmark(&self) -> u64 {
        self.landmark
    }

    /// Lowest retained priority, if any value is stored.
    pub fn min_priority(&self) -> Option<f64> {
        self.priorities.min().map(|(key, _)| key.priority())
    }
}

impl Sample for ExponentiallyDecayingSample {
    fn update(&mut self, value: f64) {
        let now = self.clock.time_secs();
        self.update_at(value, now);
    }

    fn size(&self) -> usize {
        self.count.min(self.values.len())
    }

    fn capacity(&self) -> usize {
        self.values.len()
    }

    fn snapshot(&self) -> Vec<f64> {
        self.values[..self.size()].to_vec()
    }

    fn clear(&mut self) {
        self.count = 0;
        self.priorities.clear();
        self.landmark = self.clock.time_secs();
        self.next_rescale = self.clock.tick().saturating_add(self.rescale_interval);
    }
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(1_700_000_000_000))
    }

    #[test]
    fn test_zero_capacity_fails_fast() {
        let result = ExponentiallyDecayingSample::new(0, DEFAULT_ALPHA, manual_clock());
        assert!(matches!(result, Err(MetricsError::InvalidCapacity(0))));
    }

    #[test]
    fn test_negative_alpha_rejected() {
        assert!(ExponentiallyDecayingSample::new(10, -1.0, manual_clock()).is_err());
    }

    #[test]
    fn test_fills_then_holds_capacity() {
        let mut sample = ExponentiallyDecayingSample::new(100, DEFAULT_ALPHA, manual_clock())
            .unwrap()
            .with_seed(7);

        for i in 0..1_000 {
            sample.update(f64::from(i));
            assert_eq!(sample.size(), (i as usize + 1).min(100));
            assert_eq!(sample.priorities.len(), sample.size());
        }

        let snapshot = sample.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert!(snapshot.iter().all(|v| (0.0..1_000.0).contains(v)));
    }

    #[test]
    fn test_uniform_weighting_capacity_two() {
        let mut sample = ExponentiallyDecayingSample::new(2, 0.0, manual_clock())
            .unwrap()
            .with_seed(42);

        for i in 0..5 {
            sample.update(f64::from(i));
            if i >= 1 {
                assert_eq!(sample.size(), 2);
                assert_eq!(sample.snapshot().len(), 2);
            }
        }
    }

    #[test]
    fn test_fewer_values_than_capacity() {
        let mut sample = ExponentiallyDecayingSample::new(10, DEFAULT_ALPHA, manual_clock())
            .unwrap()
            .with_seed(1);
        sample.update(1.0);
        sample.update(2.0);
        sample.update(3.0);

        assert_eq!(sample.size(), 3);
        assert_eq!(sample.snapshot(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rescale_moves_landmark_and_preserves_ranking() {
        let clock = manual_clock();
        let shared = Arc::clone(&clock) as Arc<dyn Clock>;
        let mut sample = ExponentiallyDecayingSample::new(50, DEFAULT_ALPHA, shared)
            .unwrap()
            .with_seed(3);
        for i in 0..50 {
            sample.update(f64::from(i));
        }
        let before: Vec<usize> = sample.priorities.iter().map(|(_, slot)| *slot).collect();
        let start = sample.landmark();

        clock.advance(Duration::from_secs(600));
        sample.rescale(clock.time_secs());

        let after: Vec<usize> = sample.priorities.iter().map(|(_, slot)| *slot).collect();
        assert_eq!(sample.landmark(), start + 600);
        assert_eq!(before, after);
        assert_eq!(sample.size(), 50);
    }

    #[test]
    fn test_rescale_triggers_after_interval() {
        let clock = manual_clock();
        let shared = Arc::clone(&clock) as Arc<dyn Clock>;
        let mut sample = ExponentiallyDecayingSample::new(10, DEFAULT_ALPHA, shared)
            .unwrap()
            .with_seed(9)
            .with_rescale_interval(Duration::from_secs(60));
        let start = sample.landmark();

        sample.update(1.0);
        assert_eq!(sample.landmark(), start);

        clock.advance(Duration::from_secs(61));
        sample.update(2.0);
        assert_eq!(sample.landmark(), start + 61);
    }

    #[test]
    fn test_long_lifetimes_keep_priorities_finite() {
        let clock = manual_clock();
        let shared = Arc::clone(&clock) as Arc<dyn Clock>;
        let mut sample = ExponentiallyDecayingSample::new(20, DEFAULT_ALPHA, shared)
            .unwrap()
            .with_seed(11);

        // 48 hours: exp(0.015 * 172800) would overflow without rescaling.
        for _ in 0..48 {
            for v in 0..30 {
                sample.update(f64::from(v));
            }
            clock.advance(Duration::from_secs(3_601));
        }
        sample.update(0.0);

        let min = sample.min_priority().unwrap();
        assert!(min.is_finite());
        assert_eq!(sample.size(), 20);
    }

    #[test]
    fn test_large_alpha_saturates_without_nan() {
        let clock = manual_clock();
        let shared = Arc::clone(&clock) as Arc<dyn Clock>;
        let mut sample = ExponentiallyDecayingSample::new(8, 0.5, shared)
            .unwrap()
            .with_seed(13);

        // exp(0.5 * 3600) overflows, and the rescale factor exp(-1800) underflows to 0.
        for v in 0..8 {
            sample.update(f64::from(v));
        }
        clock.advance(Duration::from_secs(3_599));
        sample.update(100.0);
        assert!(sample.priorities.iter().all(|(key, _)| key.priority().is_finite()));

        clock.advance(Duration::from_secs(2));
        sample.update(200.0);
        assert!(sample.priorities.iter().all(|(key, _)| !key.priority().is_nan()));

        sample.update(300.0);
        assert!(sample.snapshot().contains(&300.0));
        assert_eq!(sample.size(), 8);
        assert_eq!(sample.priorities.len(), 8);
    }

    #[test]
    fn test_clear_empties_reservoir() {
        let mut sample = ExponentiallyDecayingSample::new(5, DEFAULT_ALPHA, manual_clock())
            .unwrap()
            .with_seed(5);
        for i in 0..10 {
            sample.update(f64::from(i));
        }
        sample.clear();
        assert_eq!(sample.size(), 0);
        assert!(sample.snapshot().is_empty());
        assert_eq!(sample.min_priority(), None);
    }
}
