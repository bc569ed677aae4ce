//! Uniform reservoir (Vitter's algorithm R).

use crate::core::{MetricsError, Result};
use crate::metrics::sample::Sample;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Keeps a statistically uniform subset of every value ever observed.
pub struct UniformSample {
    values: Vec<f64>,
    capacity: usize,
    observed: u64,
    rng: StdRng,
}

impl UniformSample {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(MetricsError::InvalidCapacity(capacity));
        }
        Ok(Self {
            values: Vec::with_capacity(capacity),
            capacity,
            observed: 0,
            rng: StdRng::from_entropy(),
        })
    }

    /// Use a deterministic random source.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Values offered so far, retained or not.
    pub fn observed(&self) -> u64 {
        self.observed
    }
}

impl Sample for UniformSample {
    fn update(&mut self, value: f64) {
        self.observed += 1;
        if self.values.len() < self.capacity {
            self.values.push(value);
            return;
        }

        let slot = self.rng.gen_range(0..self.observed);
        if let Ok(slot) = usize::try_from(slot) {
            if slot < self.capacity {
                self.values[slot] = value;
            }
        }
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn snapshot(&self) -> Vec<f64> {
        self.values.clone()
    }

    fn clear(&mut self) {
        self.values.clear();
        self.observed = 0;
    }
}
