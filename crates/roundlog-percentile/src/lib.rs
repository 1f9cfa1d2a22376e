//! Percentile utilities over a fixed set of historical values.
//!
//! Breakpoints are read by index, `sorted[floor(N * fraction)]` clamped to the
//! last element, while the median is the true median. Non-finite inputs are
//! dropped on construction.

use roundlog_config::PercentileBreakpoints;
use roundlog_schema::analytics::Percentiles;
use serde::{Deserialize, Serialize};

/// Sorted, finite sample of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    sorted: Vec<f64>,
}

impl Distribution {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        Self { sorted }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.sorted
    }

    pub fn min(&self) -> Option<f64> {
        self.sorted.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.sorted.last().copied()
    }

    /// `sorted[floor(N * fraction)]`, clamped to the last element.
    pub fn at_fraction(&self, fraction: f64) -> Option<f64> {
        if self.sorted.is_empty() {
            return None;
        }
        let n = self.sorted.len();
        let idx = (n as f64 * fraction.clamp(0.0, 1.0)).floor() as usize;
        Some(self.sorted[idx.min(n - 1)])
    }

    /// Percentile by index, with `p` in percent.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.at_fraction(p / 100.0)
    }

    /// Mean of the two middle values for an even count.
    pub fn median(&self) -> Option<f64> {
        let n = self.sorted.len();
        match n {
            0 => None,
            _ if n % 2 == 1 => Some(self.sorted[n / 2]),
            _ => Some((self.sorted[n / 2 - 1] + self.sorted[n / 2]) / 2.0),
        }
    }

    /// Share of values at or below `value`, 0 to 100.
    pub fn percentile_rank(&self, value: f64) -> Option<f64> {
        if self.sorted.is_empty() {
            return None;
        }
        let at_or_below = self.sorted.partition_point(|v| *v <= value);
        Some(at_or_below as f64 * 100.0 / self.sorted.len() as f64)
    }

    pub fn percentiles(&self, breakpoints: &PercentileBreakpoints) -> Option<Percentiles> {
        Some(Percentiles {
            p25: self.percentile(breakpoints.p25)?,
            p50: self.median()?,
            p75: self.percentile(breakpoints.p75)?,
            p90: self.percentile(breakpoints.p90)?,
        })
    }
}

impl FromIterator<f64> for Distribution {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self::new(iter)
    }
}
