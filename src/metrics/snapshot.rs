//! Distribution statistics over a copy of a reservoir.

use serde::Serialize;

/// Sorted copy of a reservoir's values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    values: Vec<f64>,
}

impl Snapshot {
    pub fn new(mut values: Vec<f64>) -> Self {
        values.sort_unstable_by(|a, b| a.total_cmp(b));
        Self { values }
    }

    /// Value at quantile `p` in [0, 1].
    ///
    /// Uses the nearest-rank definition: index `ceil(p * n) - 1`, clamped to the
    /// stored range. An empty snapshot yields 0.
    pub fn value(&self, p: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        let n = self.values.len();
        let rank = (p.clamp(0.0, 1.0) * n as f64).ceil() as usize;
        let index = rank.saturating_sub(1).min(n - 1);
        self.values[index]
    }

    pub fn median(&self) -> f64 {
        self.value(0.5)
    }

    pub fn p75(&self) -> f64 {
        self.value(0.75)
    }

    pub fn p95(&self) -> f64 {
        self.value(0.95)
    }

    pub fn p98(&self) -> f64 {
        self.value(0.98)
    }

    pub fn p99(&self) -> f64 {
        self.value(0.99)
    }

    pub fn p999(&self) -> f64 {
        self.value(0.999)
    }

    pub fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Sample standard deviation; 0 for fewer than two values.
    pub fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return 0.0;
        }

        let mean = self.mean();
        let sum_sq: f64 = self.values.iter().map(|v| (v - mean).powi(2)).sum();
        (sum_sq / (n - 1) as f64).sqrt()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
